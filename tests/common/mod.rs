#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use static_images_swc::{Fetch, FetchError, FetchResponse, Url};
use swc_core::common::{sync::Lrc, FileName, SourceMap};
use swc_core::ecma::ast::*;
use swc_core::ecma::parser::{parse_file_as_module, EsSyntax, Syntax};
use swc_core::ecma::visit::{Visit, VisitWith};

pub const RUNTIME_IMPORT: &str =
    r#"import { jsx as _jsx, jsxs as _jsxs } from "react/jsx-runtime";"#;

pub fn parse(src: &str) -> Program {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Custom("index.mdx".into()).into(), src.to_string());
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

/// Compiled-MDX shaped module rendering the given children expressions.
pub fn mdx_module(children: &[&str]) -> Program {
    parse(&format!(
        r#"{RUNTIME_IMPORT}
        function _createMdxContent(props) {{
            const _components = {{ img: "img", p: "p", ...props.components }};
            return _jsxs(_components.p, {{ children: [{}] }});
        }}
        export default function MDXContent(props = {{}}) {{
            return _jsx(_createMdxContent, {{ ...props }});
        }}"#,
        children.join(", ")
    ))
}

/// `(local, source)` of every import declaration, in body order.
pub fn imports(program: &Program) -> Vec<(String, String)> {
    let Program::Module(m) = program else {
        return vec![];
    };
    m.body
        .iter()
        .filter_map(|item| match item {
            ModuleItem::ModuleDecl(ModuleDecl::Import(decl)) => {
                let local = decl
                    .specifiers
                    .iter()
                    .map(|s| match s {
                        ImportSpecifier::Default(d) => d.local.sym.to_string(),
                        ImportSpecifier::Named(n) => n.local.sym.to_string(),
                        ImportSpecifier::Namespace(n) => n.local.sym.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                Some((local, decl.src.value.to_string()))
            }
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SrcValue {
    Ident(String),
    Str(String),
    Other,
}

/// Value of every `src: <value>` key/value property, in source order.
pub fn src_values(program: &Program) -> Vec<SrcValue> {
    struct Collect(Vec<SrcValue>);
    impl Visit for Collect {
        fn visit_key_value_prop(&mut self, n: &KeyValueProp) {
            if matches!(&n.key, PropName::Ident(k) if k.sym.as_ref() == "src") {
                self.0.push(match &*n.value {
                    Expr::Ident(i) => SrcValue::Ident(i.sym.to_string()),
                    Expr::Lit(Lit::Str(s)) => SrcValue::Str(s.value.to_string()),
                    _ => SrcValue::Other,
                });
            }
            n.visit_children_with(self);
        }
    }
    let mut c = Collect(vec![]);
    program.visit_with(&mut c);
    c.0
}

pub fn cache_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    static_images_swc::content_hash(bytes, static_images_swc::HashEncoding::Hex)
}

// -----------------------------------------------------------------------------
// Fake transports
// -----------------------------------------------------------------------------

type Step = Result<FetchResponse, FetchError>;

/// Per-URL scripted responses; unscripted URLs fail at the transport level.
#[derive(Default)]
pub struct FakeFetch {
    routes: Mutex<HashMap<String, VecDeque<Step>>>,
    repeating: Mutex<HashMap<String, FetchResponse>>,
    calls: AtomicU32,
}

impl FakeFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, url: &str, steps: Vec<Step>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), steps.into());
        self
    }

    pub fn always(self, url: &str, response: FetchResponse) -> Self {
        self.repeating
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for FakeFetch {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(step) = self
            .routes
            .lock()
            .unwrap()
            .get_mut(url.as_str())
            .and_then(VecDeque::pop_front)
        {
            return step;
        }
        if let Some(response) = self.repeating.lock().unwrap().get(url.as_str()) {
            return Ok(response.clone());
        }
        Err(FetchError::transport(url.as_str(), "unreachable"))
    }
}

/// Never answers within any reasonable deadline.
pub struct StalledFetch;

#[async_trait]
impl Fetch for StalledFetch {
    async fn fetch(&self, _url: &Url) -> Result<FetchResponse, FetchError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(FetchResponse::new(200, "late"))
    }
}
