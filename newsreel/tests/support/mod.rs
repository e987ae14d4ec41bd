#![allow(dead_code)]

use std::sync::Arc;

use common::{OverlayStyle, PipelineConfig};
use tokio::sync::Mutex;

use newsreel::article::Article;
use newsreel::assembler::{AudioPicker, VideoAssembler};
use newsreel::batch::BatchSelector;
use newsreel::error::{PipelineError, PipelineResult};
use newsreel::imaging::ImageProducer;
use newsreel::llm::{ContentEnhancer, EnhancedContent, MetadataSynthesizer, SynthesizedMetadata};
use newsreel::orchestrator::{Collaborators, RunOrchestrator};
use newsreel::publisher::{PublishedVideo, Publisher, VideoMetadata};
use newsreel::sources::{ArticleSource, NewsAggregator};
use newsreel::storage::TitleStore;

pub fn articles(titles: &[&str]) -> Vec<Article> {
    titles
        .iter()
        .map(|t| Article::new(*t, format!("https://example.com/{}", t)).with_summary(format!("about {}", t)))
        .collect()
}

pub struct FixedSource(pub Vec<Article>);

#[async_trait::async_trait]
impl ArticleSource for FixedSource {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch(&self, _limit: usize) -> PipelineResult<Vec<Article>> {
        Ok(self.0.clone())
    }
}

/// Title store whose backend is gone.
pub struct BrokenStore;

#[async_trait::async_trait]
impl TitleStore for BrokenStore {
    async fn contains_any(&self, _titles: &[String]) -> PipelineResult<bool> {
        Err(PipelineError::Storage(sqlx::Error::PoolClosed))
    }

    async fn insert_if_absent(&self, _batch: &[Article]) -> PipelineResult<bool> {
        Err(PipelineError::Storage(sqlx::Error::PoolClosed))
    }
}

/// Prefixes everything so the order of calls shows up in the outputs.
#[derive(Default)]
pub struct EchoEnhancer {
    pub fail_on: Option<String>,
    pub calls: Mutex<Vec<String>>,
}

impl EchoEnhancer {
    pub fn failing_on(title: &str) -> Self {
        Self {
            fail_on: Some(title.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl ContentEnhancer for EchoEnhancer {
    async fn enhance(&self, title: &str, summary: &str) -> PipelineResult<EnhancedContent> {
        self.calls.lock().await.push(title.to_string());
        if self.fail_on.as_deref() == Some(title) {
            return Err(PipelineError::EnrichmentParse(format!("garbled answer for {}", title)));
        }
        Ok(EnhancedContent {
            enhanced_title: format!("H:{}", title),
            enhanced_summary: format!("S:{}", summary),
            image_prompt: format!("P:{}", title),
        })
    }
}

#[derive(Default)]
pub struct EchoImages {
    pub fail_on: Option<String>,
    pub generated: Mutex<Vec<String>>,
}

impl EchoImages {
    pub fn failing_on(prompt: &str) -> Self {
        Self {
            fail_on: Some(prompt.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl ImageProducer for EchoImages {
    async fn generate(&self, prompt: &str) -> PipelineResult<Vec<u8>> {
        if self.fail_on.as_deref() == Some(prompt) {
            return Err(PipelineError::ImageGeneration(format!("no image for {}", prompt)));
        }
        self.generated.lock().await.push(prompt.to_string());
        Ok(prompt.as_bytes().to_vec())
    }

    async fn overlay_title(&self, image: &[u8], _title: &str) -> PipelineResult<Vec<u8>> {
        Ok([b"T:".as_slice(), image].concat())
    }

    async fn overlay_title_and_summary(
        &self,
        image: &[u8],
        _title: &str,
        _summary: &str,
        _style: &OverlayStyle,
    ) -> PipelineResult<Vec<u8>> {
        Ok([b"C:".as_slice(), image].concat())
    }
}

pub enum MetadataBehaviour {
    Answer(SynthesizedMetadata),
    Unparseable,
}

pub struct StubMetadata {
    pub behaviour: MetadataBehaviour,
    pub seen: Mutex<Vec<String>>,
}

impl StubMetadata {
    pub fn answering(title: &str, description: &str) -> Self {
        Self {
            behaviour: MetadataBehaviour::Answer(SynthesizedMetadata {
                title: title.to_string(),
                description: description.to_string(),
            }),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn unparseable() -> Self {
        Self {
            behaviour: MetadataBehaviour::Unparseable,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl MetadataSynthesizer for StubMetadata {
    async fn synthesize(&self, texts: &[String]) -> PipelineResult<SynthesizedMetadata> {
        self.seen.lock().await.extend(texts.iter().cloned());
        match &self.behaviour {
            MetadataBehaviour::Answer(m) => Ok(m.clone()),
            MetadataBehaviour::Unparseable => {
                Err(PipelineError::MetadataParse("not even close to JSON".to_string()))
            }
        }
    }
}

pub struct FixedAudio;

#[async_trait::async_trait]
impl AudioPicker for FixedAudio {
    async fn pick(&self) -> PipelineResult<Vec<u8>> {
        Ok(b"ID3".to_vec())
    }
}

#[derive(Default)]
pub struct RecordingAssembler {
    pub frames: Mutex<Vec<Vec<u8>>>,
    pub audio: Mutex<Vec<u8>>,
    pub fail: bool,
}

#[async_trait::async_trait]
impl VideoAssembler for RecordingAssembler {
    async fn assemble(&self, frames: &[Vec<u8>], audio: &[u8]) -> PipelineResult<Vec<u8>> {
        if self.fail {
            return Err(PipelineError::Assembly("API call failed with status 502".to_string()));
        }
        self.frames.lock().await.extend(frames.iter().cloned());
        *self.audio.lock().await = audio.to_vec();
        Ok(b"MP4".to_vec())
    }
}

pub enum PublishBehaviour {
    Ok(&'static str),
    AuthExpired,
    Broken,
}

pub struct StubPublisher {
    pub behaviour: PublishBehaviour,
    pub uploads: Mutex<Vec<VideoMetadata>>,
}

impl StubPublisher {
    pub fn new(behaviour: PublishBehaviour) -> Self {
        Self {
            behaviour,
            uploads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl Publisher for StubPublisher {
    async fn publish(&self, _video: &[u8], metadata: &VideoMetadata) -> PipelineResult<PublishedVideo> {
        self.uploads.lock().await.push(metadata.clone());
        match self.behaviour {
            PublishBehaviour::Ok(id) => Ok(PublishedVideo::from_id(id)),
            PublishBehaviour::AuthExpired => Err(PipelineError::AuthExpired("invalid_grant".to_string())),
            PublishBehaviour::Broken => Err(PipelineError::Publish("quota exceeded".to_string())),
        }
    }
}

pub fn fast_pipeline() -> PipelineConfig {
    PipelineConfig {
        inter_article_delay_seconds: 0,
        feed_delay_seconds: 0,
        ..PipelineConfig::default()
    }
}

pub struct Harness {
    pub enhancer: Arc<EchoEnhancer>,
    pub images: Arc<EchoImages>,
    pub metadata: Arc<StubMetadata>,
    pub assembler: Arc<RecordingAssembler>,
}

/// Orchestrator over `candidates` with recording stubs and no delays.
pub fn orchestrator(
    candidates: Vec<Article>,
    store: Arc<dyn TitleStore>,
    enhancer: EchoEnhancer,
    metadata: StubMetadata,
    assembler: RecordingAssembler,
) -> (RunOrchestrator, Harness) {
    orchestrator_with(
        fast_pipeline(),
        candidates,
        store,
        enhancer,
        EchoImages::default(),
        metadata,
        assembler,
    )
}

pub fn orchestrator_with(
    pipeline: PipelineConfig,
    candidates: Vec<Article>,
    store: Arc<dyn TitleStore>,
    enhancer: EchoEnhancer,
    images: EchoImages,
    metadata: StubMetadata,
    assembler: RecordingAssembler,
) -> (RunOrchestrator, Harness) {
    let harness = Harness {
        enhancer: Arc::new(enhancer),
        images: Arc::new(images),
        metadata: Arc::new(metadata),
        assembler: Arc::new(assembler),
    };
    let collaborators = Collaborators {
        enhancer: harness.enhancer.clone(),
        images: harness.images.clone(),
        metadata: harness.metadata.clone(),
        audio: Arc::new(FixedAudio),
        assembler: harness.assembler.clone(),
    };
    let aggregator = NewsAggregator::new(vec![Box::new(FixedSource(candidates))], &pipeline);
    let orchestrator = RunOrchestrator::new(
        aggregator,
        BatchSelector::new(store),
        collaborators,
        &pipeline,
        &OverlayStyle::default(),
    );
    (orchestrator, harness)
}
