//! End-to-end orchestration tests with a scripted remote capability

use async_trait::async_trait;
use fashion_gen_orchestrator::backend::{
    GenerationCall, GenerationResponse, GeneratorRegistry, ImageGenerator, InlineData,
};
use fashion_gen_orchestrator::orchestrator::{
    AttemptState, BatchResult, BatchRunner, GeneratedImage, GenerationEvent, GenerationMode,
    GenerationObserver, GenerationRequest, IdentityReference, ImageCodec, ImageRef,
    InMemoryHistory, InMemorySafetyTracker, Orchestrator, ProvenanceSink, RecordingObserver,
    RetryMachine, RetryPolicy, RetryStatus, SafetyTracker,
};
use fashion_gen_orchestrator::AppError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OWNER: &str = "user-1";

/// Scripted outcome of one remote call
#[derive(Debug, Clone)]
enum Step {
    Image(&'static str),
    Fail(&'static str),
    Moderated,
    TextOnly,
}

/// Remote capability that replays a script and records every call
struct ScriptedGenerator {
    name: String,
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<GenerationCall>>,
}

impl ScriptedGenerator {
    fn new(name: &str, steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "scripted-image-model"
    }

    async fn generate(&self, call: &GenerationCall) -> fashion_gen_orchestrator::Result<GenerationResponse> {
        self.calls.lock().push(call.clone());
        let step = self.script.lock().pop_front().unwrap_or(Step::Fail("script exhausted"));

        match step {
            Step::Image(data) => Ok(GenerationResponse::with_image(InlineData::new("image/png", data))),
            Step::Fail(message) => Err(AppError::BackendError(message.to_string())),
            Step::Moderated => Ok(GenerationResponse::finished("IMAGE_SAFETY")),
            Step::TextOnly => Ok(GenerationResponse::finished("STOP")),
        }
    }
}

struct Harness {
    generator: Arc<ScriptedGenerator>,
    safety: Arc<InMemorySafetyTracker>,
    history: Arc<InMemoryHistory>,
    orchestrator: Orchestrator,
}

fn harness(steps: Vec<Step>) -> Harness {
    harness_with_warnings(steps, 3)
}

fn harness_with_warnings(steps: Vec<Step>, max_warnings: u32) -> Harness {
    let generator = ScriptedGenerator::new("standard", steps);
    let registry = Arc::new(GeneratorRegistry::new("standard"));
    registry.register(generator.clone()).unwrap();

    let safety = Arc::new(InMemorySafetyTracker::new(max_warnings));
    let history = Arc::new(InMemoryHistory::new(50));
    let orchestrator = Orchestrator::new(
        registry,
        ImageCodec::new(Duration::from_secs(1)).unwrap(),
        safety.clone(),
        history.clone(),
        RetryPolicy::immediate(),
    );

    Harness {
        generator,
        safety,
        history,
        orchestrator,
    }
}

fn data_url(payload: &str) -> ImageRef {
    ImageRef::from_source(format!("data:image/jpeg;base64,{}", payload))
}

fn re_pose(batch_size: u32) -> GenerationRequest {
    GenerationRequest::new(GenerationMode::RePose)
        .with_primary(data_url("c3ViamVjdA=="))
        .with_batch_size(batch_size)
}

fn create_model(batch_size: u32) -> GenerationRequest {
    GenerationRequest::new(GenerationMode::CreateModel)
        .with_primary(data_url("b3V0Zml0"))
        .with_batch_size(batch_size)
}

fn image_payloads(call: &GenerationCall) -> Vec<String> {
    call.images().iter().map(|i| i.data.clone()).collect()
}

#[tokio::test]
async fn test_single_image_success() {
    let h = harness(vec![Step::Image("b25l")]);
    let mut observer = RecordingObserver::default();

    let item = h
        .orchestrator
        .generate(OWNER, re_pose(1), &mut observer)
        .await
        .unwrap();

    assert_eq!(item.images.len(), 1);
    assert_eq!(item.images[0].image.data, "b25l");
    assert_eq!(item.requested, 1);
    assert_eq!(item.model_variant, "standard");
    assert_eq!(item.prompt, "Re-pose (no prompt)");
    assert_eq!(observer.statuses(), vec![RetryStatus::Generating]);

    let calls = h.generator.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].model, "scripted-image-model");
    assert_eq!(calls[0].image_config.aspect_ratio.as_deref(), Some("3:4"));
    assert_eq!(image_payloads(&calls[0]), vec!["c3ViamVjdA==".to_string()]);
}

#[tokio::test]
async fn test_item_failures_do_not_abort_batch() {
    let h = harness(vec![
        Step::Image("b25l"),
        Step::Fail("transient"),
        Step::TextOnly,
        Step::Image("Zm91cg=="),
    ]);
    let mut observer = RecordingObserver::default();

    let item = h
        .orchestrator
        .generate(OWNER, re_pose(4), &mut observer)
        .await
        .unwrap();

    assert_eq!(h.generator.calls().len(), 4);
    let indices: Vec<u32> = item.images.iter().map(|i| i.index).collect();
    assert_eq!(indices, vec![0, 3]);
    assert_eq!(item.requested, 4);
    assert_eq!(observer.items_for(0), vec![0, 3]);
}

#[tokio::test]
async fn test_each_variation_gets_its_own_directive() {
    let h = harness(vec![Step::Image("YQ=="), Step::Image("Yg=="), Step::Image("Yw==")]);

    h.orchestrator
        .generate(OWNER, re_pose(3), &mut ())
        .await
        .unwrap();

    let calls = h.generator.calls();
    for (index, call) in calls.iter().enumerate() {
        let expected = format!("VARIATION {} OF 3", index + 1);
        assert!(call.instruction().contains(&expected));
    }
}

#[tokio::test]
async fn test_empty_attempt_retries_then_succeeds() {
    let h = harness(vec![Step::Fail("first"), Step::Fail("second"), Step::Image("b2s=")]);
    let mut observer = RecordingObserver::default();

    let item = h
        .orchestrator
        .generate(OWNER, re_pose(2), &mut observer)
        .await
        .unwrap();

    assert_eq!(h.generator.calls().len(), 3);
    assert_eq!(item.images.len(), 1);
    assert_eq!(item.images[0].index, 0);
    assert_eq!(observer.items_for(1), vec![0]);
    assert!(observer
        .events
        .contains(&GenerationEvent::Cleared { attempt: 0 }));
    assert_eq!(
        observer.statuses(),
        vec![
            RetryStatus::Generating,
            RetryStatus::RetryingIn(2),
            RetryStatus::RetryingIn(1),
            RetryStatus::Reconnecting,
        ]
    );
}

#[tokio::test]
async fn test_three_failed_attempts_are_terminal() {
    let h = harness(vec![Step::Fail("one"), Step::Fail("two"), Step::Fail("upstream exploded")]);
    let mut observer = RecordingObserver::default();

    let result = h.orchestrator.generate(OWNER, re_pose(1), &mut observer).await;

    match result {
        Err(AppError::TerminalFailure(message)) => {
            assert!(message.starts_with("No images were generated"));
            assert!(message.contains("upstream exploded"));
        }
        other => panic!("expected terminal failure, got {:?}", other),
    }
    assert_eq!(h.generator.calls().len(), 3);
    assert_eq!(
        observer.statuses(),
        vec![
            RetryStatus::Generating,
            RetryStatus::RetryingIn(2),
            RetryStatus::RetryingIn(1),
            RetryStatus::Reconnecting,
            RetryStatus::FinalAttempt,
        ]
    );
    assert!(h.history.is_empty());
}

#[tokio::test]
async fn test_create_model_carries_identity_forward() {
    let h = harness(vec![Step::Image("Zmlyc3Q="), Step::Image("c2Vjb25k"), Step::Image("dGhpcmQ=")]);

    h.orchestrator
        .generate(OWNER, create_model(3), &mut ())
        .await
        .unwrap();

    let calls = h.generator.calls();
    assert_eq!(image_payloads(&calls[0]), vec!["b3V0Zml0".to_string()]);
    assert_eq!(
        image_payloads(&calls[1]),
        vec!["b3V0Zml0".to_string(), "Zmlyc3Q=".to_string()]
    );
    assert_eq!(
        image_payloads(&calls[2]),
        vec!["b3V0Zml0".to_string(), "Zmlyc3Q=".to_string()]
    );
}

#[tokio::test]
async fn test_random_face_never_sends_identity() {
    let h = harness(vec![Step::Image("Zmlyc3Q="), Step::Image("c2Vjb25k")]);

    h.orchestrator
        .generate(OWNER, create_model(2).with_random_face(true), &mut ())
        .await
        .unwrap();

    for call in h.generator.calls() {
        assert_eq!(image_payloads(&call), vec!["b3V0Zml0".to_string()]);
    }
}

#[tokio::test]
async fn test_identity_comes_from_first_success_in_attempt() {
    let h = harness(vec![
        Step::Fail("down"),
        Step::Fail("down"),
        Step::Fail("down"),
        Step::Image("bmV3"),
        Step::Image("bmV4dA=="),
    ]);

    h.orchestrator
        .generate(OWNER, create_model(3), &mut ())
        .await
        .unwrap();

    let calls = h.generator.calls();
    assert_eq!(calls.len(), 6);
    // Attempt 1: item 0 succeeds and becomes the identity for items 1 and 2
    assert_eq!(image_payloads(&calls[3]), vec!["b3V0Zml0".to_string()]);
    assert_eq!(
        image_payloads(&calls[4]),
        vec!["b3V0Zml0".to_string(), "bmV3".to_string()]
    );
    assert_eq!(
        image_payloads(&calls[5]),
        vec!["b3V0Zml0".to_string(), "bmV3".to_string()]
    );
}

#[tokio::test]
async fn test_identity_skips_failed_leading_items() {
    let h = harness(vec![Step::Fail("blip"), Step::Image("c2Vjb25k"), Step::Image("dGhpcmQ=")]);

    h.orchestrator
        .generate(OWNER, create_model(3), &mut ())
        .await
        .unwrap();

    let calls = h.generator.calls();
    assert_eq!(image_payloads(&calls[1]), vec!["b3V0Zml0".to_string()]);
    assert_eq!(
        image_payloads(&calls[2]),
        vec!["b3V0Zml0".to_string(), "c2Vjb25k".to_string()]
    );
}

#[tokio::test]
async fn test_moderation_is_reported_and_item_skipped() {
    let h = harness(vec![Step::Moderated, Step::Image("b2s=")]);

    let item = h
        .orchestrator
        .generate(OWNER, re_pose(2), &mut ())
        .await
        .unwrap();

    assert_eq!(item.images.len(), 1);
    assert_eq!(h.safety.warnings_for(OWNER), 1);
}

#[tokio::test]
async fn test_moderated_request_is_not_resent() {
    let h = harness(vec![Step::Moderated, Step::Moderated, Step::Moderated]);
    let mut observer = RecordingObserver::default();

    let result = h.orchestrator.generate(OWNER, re_pose(1), &mut observer).await;

    match result {
        Err(AppError::ModerationRejected(reason)) => assert_eq!(reason, "IMAGE_SAFETY"),
        other => panic!("expected moderation rejection, got {:?}", other),
    }
    assert_eq!(h.generator.calls().len(), 1);
    assert_eq!(h.safety.warnings_for(OWNER), 1);
    assert!(!h.safety.is_suspended(OWNER).await.unwrap());
    assert_eq!(observer.statuses(), vec![RetryStatus::Generating]);
    assert!(h.history.is_empty());
}

#[tokio::test]
async fn test_moderated_batch_counts_one_warning_per_item() {
    let h = harness(vec![Step::Moderated, Step::Moderated]);

    let result = h.orchestrator.generate(OWNER, re_pose(2), &mut ()).await;

    assert!(matches!(result, Err(AppError::ModerationRejected(_))));
    assert_eq!(h.generator.calls().len(), 2);
    assert_eq!(h.safety.warnings_for(OWNER), 2);
}

#[tokio::test]
async fn test_mixed_failures_are_still_retried() {
    let h = harness(vec![Step::Moderated, Step::Fail("timeout"), Step::Image("YQ==")]);

    let item = h
        .orchestrator
        .generate(OWNER, re_pose(2), &mut ())
        .await
        .unwrap();

    assert_eq!(item.images.len(), 1);
    assert_eq!(h.generator.calls().len(), 4);
    assert_eq!(h.safety.warnings_for(OWNER), 1);
}

#[tokio::test]
async fn test_suspension_stops_without_retry() {
    let h = harness_with_warnings(vec![Step::Moderated, Step::Image("bmV2ZXI=")], 1);
    let mut observer = RecordingObserver::default();

    let result = h.orchestrator.generate(OWNER, re_pose(2), &mut observer).await;

    assert!(matches!(result, Err(AppError::AccountSuspended(_))));
    assert_eq!(h.generator.calls().len(), 1);
    assert_eq!(observer.statuses(), vec![RetryStatus::Generating]);
    assert!(h.history.is_empty());
}

#[tokio::test]
async fn test_suspended_owner_is_rejected_up_front() {
    let h = harness_with_warnings(vec![Step::Moderated], 1);
    let _ = h.orchestrator.generate(OWNER, re_pose(1), &mut ()).await;
    assert!(h.safety.is_suspended(OWNER).await.unwrap());

    let calls_before = h.generator.calls().len();
    let result = h.orchestrator.generate(OWNER, re_pose(1), &mut ()).await;

    assert!(matches!(result, Err(AppError::AccountSuspended(_))));
    assert_eq!(h.generator.calls().len(), calls_before);
}

#[tokio::test]
async fn test_invalid_requests_make_no_calls() {
    let h = harness(vec![Step::Image("b2s=")]);

    let missing_outfit = GenerationRequest::new(GenerationMode::TryOn).with_primary(data_url("cA=="));
    let result = h.orchestrator.generate(OWNER, missing_outfit, &mut ()).await;
    assert!(matches!(result, Err(AppError::InvalidRequest(_))));

    let oversized = re_pose(5);
    let result = h.orchestrator.generate(OWNER, oversized, &mut ()).await;
    assert!(matches!(result, Err(AppError::InvalidRequest(_))));

    let unknown_variant = re_pose(1).with_model_variant("ultra");
    let result = h.orchestrator.generate(OWNER, unknown_variant, &mut ()).await;
    assert!(matches!(result, Err(AppError::ModelNotFound(_))));

    assert!(h.generator.calls().is_empty());
}

#[tokio::test]
async fn test_history_records_successful_batches_per_owner() {
    let h = harness(vec![Step::Image("YQ=="), Step::Image("Yg==")]);

    h.orchestrator
        .generate(OWNER, re_pose(1).with_prompt("on a rooftop"), &mut ())
        .await
        .unwrap();
    h.orchestrator
        .generate("someone-else", re_pose(1), &mut ())
        .await
        .unwrap();

    let mine = h.orchestrator.history(OWNER).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].prompt, "on a rooftop");
    assert_eq!(mine[0].mode, GenerationMode::RePose);
    assert!(mine[0].thumbnail.is_none());
    assert_eq!(h.history.history("someone-else").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_aspect_ratio_and_resolution_pass_through() {
    let h = harness(vec![Step::Image("YQ==")]);
    let mut request = re_pose(1).with_aspect_ratio("9:16");
    request.resolution_hint = Some("2K".to_string());

    h.orchestrator.generate(OWNER, request, &mut ()).await.unwrap();

    let calls = h.generator.calls();
    assert_eq!(calls[0].image_config.aspect_ratio.as_deref(), Some("9:16"));
    assert_eq!(calls[0].image_config.image_size.as_deref(), Some("2K"));
}

#[tokio::test]
async fn test_unreachable_url_fails_only_that_item() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subject.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let h = harness(vec![Step::Image("b2s=")]);
    let request = GenerationRequest::new(GenerationMode::RePose)
        .with_primary(ImageRef::from_source(format!("{}/subject.png", server.uri())))
        .with_batch_size(2);

    let item = h.orchestrator.generate(OWNER, request, &mut ()).await.unwrap();

    assert_eq!(item.images.len(), 1);
    assert_eq!(item.images[0].index, 0);
    assert_eq!(h.generator.calls().len(), 1);
    assert_eq!(h.generator.calls()[0].images()[0].mime_type, "image/png");
}

/// Runner whose first attempt yields two images and then fails as a whole
#[derive(Default)]
struct PartialThenSucceed {
    seen: Mutex<Vec<(u32, usize, bool)>>,
}

#[async_trait]
impl BatchRunner for PartialThenSucceed {
    async fn run_batch(
        &self,
        _request: &GenerationRequest,
        state: &mut AttemptState,
        observer: &mut dyn GenerationObserver,
    ) -> fashion_gen_orchestrator::Result<BatchResult> {
        let attempt = state.attempt_index();
        self.seen
            .lock()
            .push((attempt, state.accumulated().len(), state.identity().is_some()));

        if attempt == 0 {
            for index in 0..2 {
                let image = GeneratedImage {
                    index,
                    image: InlineData::new("image/png", "cGFydGlhbA=="),
                };
                observer.on_item(attempt, &image);
                state.push(image);
            }
            state.set_identity(IdentityReference::new(InlineData::new(
                "image/png",
                "cGFydGlhbA==",
            )));
            return Err(AppError::EmptyBatch("attempt abandoned".to_string()));
        }

        let image = GeneratedImage {
            index: 0,
            image: InlineData::new("image/png", "ZnJlc2g="),
        };
        observer.on_item(attempt, &image);
        state.push(image);
        Ok(BatchResult::new(state.accumulated().to_vec()).unwrap())
    }
}

#[tokio::test]
async fn test_retry_starts_next_attempt_from_scratch() {
    let runner = PartialThenSucceed::default();
    let machine = RetryMachine::new(RetryPolicy::immediate());
    let mut observer = RecordingObserver::default();

    let batch = machine
        .run(&runner, &re_pose(2), &mut observer)
        .await
        .unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(batch.images()[0].image.data, "ZnJlc2g=");
    assert_eq!(*runner.seen.lock(), vec![(0, 0, false), (1, 0, false)]);

    assert_eq!(observer.items_for(0), vec![0, 1]);
    assert_eq!(observer.items_for(1), vec![0]);

    let cleared_at = observer
        .events
        .iter()
        .position(|e| *e == GenerationEvent::Cleared { attempt: 0 })
        .unwrap();
    let last_attempt_zero_item = observer
        .events
        .iter()
        .rposition(|e| matches!(e, GenerationEvent::Item { attempt: 0, .. }))
        .unwrap();
    let first_attempt_one_item = observer
        .events
        .iter()
        .position(|e| matches!(e, GenerationEvent::Item { attempt: 1, .. }))
        .unwrap();
    assert!(last_attempt_zero_item < cleared_at && cleared_at < first_attempt_one_item);
}
