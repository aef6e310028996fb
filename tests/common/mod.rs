//! Scripted chat backend shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use goal_roadmap::clients::traits::{BackendError, ChatBackend, ChatRequest, Role};
use goal_roadmap::config::GenerationConfig;
use goal_roadmap::invoker::ProviderRegistry;
use goal_roadmap::router::RoadmapService;

/// What a model does on its next call
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    RateLimited,
    Status(u16),
    Transport,
    Hang,
    /// Answer after sleeping on the tokio clock
    After(Duration, String),
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub user_prompt: String,
}

#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<RecordedCall>>,
    configured: bool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            configured: true,
            ..Default::default()
        }
    }

    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn script(self, model: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .extend(steps);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn models_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model).collect()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(
        &self,
        model: &str,
        request: &ChatRequest,
        timeout: Duration,
    ) -> Result<String, BackendError> {
        let user_prompt = request
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            timeout,
            temperature: request.temperature,
            user_prompt,
        });

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(model)
            .and_then(|q| q.pop_front());

        match step {
            Some(Step::Reply(text)) => Ok(text),
            Some(Step::RateLimited) => Err(BackendError::RateLimited { retry_after: None }),
            Some(Step::Status(status)) => Err(BackendError::Status {
                status,
                body: "scripted failure".to_string(),
            }),
            Some(Step::Transport) => Err(BackendError::Transport("connection reset".to_string())),
            Some(Step::Hang) => std::future::pending().await,
            Some(Step::After(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            None => Err(BackendError::Status {
                status: 500,
                body: format!("no script left for {}", model),
            }),
        }
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn registry(models: &[&str]) -> ProviderRegistry {
    ProviderRegistry {
        models: models.iter().map(|m| m.to_string()).collect(),
        timeout_tiers: vec![
            Duration::from_secs(30),
            Duration::from_secs(45),
            Duration::from_secs(60),
        ],
        max_retries: 1,
        retry_delay: Duration::ZERO,
    }
}

pub fn service(backend: Arc<ScriptedBackend>, models: &[&str]) -> RoadmapService {
    RoadmapService::new(backend, registry(models), GenerationConfig::default())
}

pub fn five_milestones() -> String {
    r#"```json
[
  {"title": "Python and math foundations", "year": 1, "description": "Linear algebra, probability, Python."},
  {"title": "Classical ML", "year": 1, "description": "Regression, trees, evaluation."},
  {"title": "Deep learning", "year": 1, "description": "PyTorch, CNNs, RNNs."},
  {"title": "Transformers and NLP", "year": 2, "description": "Attention, fine-tuning, tokenizers."},
  {"title": "Portfolio and job search", "year": 2, "description": "Two NLP projects and applications."}
]
```"#
    .to_string()
}
