#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use futures::stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use storyforge_gateway::app;
use storyforge_gateway::error::GenerationError;
use storyforge_gateway::provider::{GenerationRequest, TextGenerator, TextStream};
use storyforge_gateway::rate_limit::Limiters;
use storyforge_gateway::state::AppState;

// One canned reply: a whole text, or the fragments a streaming call yields
pub enum Reply {
    Text(Result<String, GenerationError>),
    Fragments(Vec<Result<String, GenerationError>>),
}

// Generator that replays canned replies and records every request
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, GenerationError>>) -> Arc<Self> {
        Self::with_replies(replies.into_iter().map(Reply::Text).collect())
    }

    pub fn with_replies(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn streaming(fragments: Vec<Result<String, GenerationError>>) -> Arc<Self> {
        Self::with_replies(vec![Reply::Fragments(fragments)])
    }

    pub fn always(text: &str, times: usize) -> Arc<Self> {
        Self::new((0..times).map(|_| Ok(text.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl ScriptedGenerator {
    fn next_reply(&self, request: GenerationRequest) -> Reply {
        self.seen.lock().unwrap().push(request);
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Reply::Text(Err(GenerationError::Transport("no scripted reply".into())))
        })
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        match self.next_reply(request) {
            Reply::Text(reply) => reply,
            Reply::Fragments(fragments) => fragments.into_iter().collect(),
        }
    }

    async fn generate_stream(
        &self,
        request: GenerationRequest,
    ) -> Result<TextStream, GenerationError> {
        match self.next_reply(request) {
            Reply::Text(reply) => {
                let text = reply?;
                Ok(Box::pin(stream::iter(vec![Ok::<_, GenerationError>(text)])))
            }
            Reply::Fragments(fragments) => Ok(Box::pin(stream::iter(fragments))),
        }
    }
}

pub fn state(generator: Arc<ScriptedGenerator>) -> Arc<AppState> {
    Arc::new(AppState::new(
        generator,
        Limiters::default(),
        "gemini-test",
        "gemini-title-test",
    ))
}

pub fn router(state: Arc<AppState>) -> Router {
    app(state)
}

pub fn post_json(uri: &str, headers: &[(&str, &str)], body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn text_body(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn outline_text(arcs: u32, chapters_per_arc: u32) -> String {
    let mut out = String::from("# Untitled\n\n**Logline:** A test.\n\n");
    let mut chapter = 1;
    for arc in 1..=arcs {
        out.push_str(&format!("## Arc {arc}: Arc title\n\n"));
        for _ in 0..chapters_per_arc {
            out.push_str(&format!("### Chapter {chapter}: Chapter title\n**Summary:** ...\n\n"));
            chapter += 1;
        }
    }
    out
}
