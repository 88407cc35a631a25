//! Test-only helpers: scripted transports and a JSX module parser.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Url;
use swc_core::common::{sync::Lrc, FileName, SourceMap};
use swc_core::ecma::ast::{EsVersion, Program};
use swc_core::ecma::parser::{parse_file_as_module, EsSyntax, Syntax};

use crate::error::FetchError;
use crate::fetch::{Fetch, FetchResponse};

type Step = Result<FetchResponse, FetchError>;

/// Plays back canned responses in order, then the fallback if any.
#[derive(Default)]
pub struct ScriptedFetch {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<FetchResponse>,
    calls: AtomicU32,
}

impl ScriptedFetch {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        }
    }

    pub fn repeating(response: FetchResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for ScriptedFetch {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(step) = self.steps.lock().unwrap().pop_front() {
            return step;
        }
        match &self.fallback {
            Some(response) => Ok(response.clone()),
            None => Err(FetchError::transport(url.as_str(), "no scripted response")),
        }
    }
}

pub fn parse_program(src: &str) -> Program {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Custom("input.js".into()).into(), src.to_string());
    let module = parse_file_as_module(
        &fm,
        Syntax::Es(EsSyntax {
            jsx: true,
            ..Default::default()
        }),
        EsVersion::latest(),
        None,
        &mut vec![],
    )
    .expect("test source should parse");
    Program::Module(module)
}
