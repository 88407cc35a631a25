//! Snapshot of image call sites and the synchronous rewrite pass.
//!
//! Discovery never mutates; rewriting never suspends. Everything in between
//! (reading, fetching, caching) happens against the immutable snapshot.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use swc_core::{
    common::{SyntaxContext, DUMMY_SP},
    ecma::{
        ast::*,
        visit::{Visit, VisitMut, VisitMutWith, VisitWith},
    },
};
use uuid::Uuid;

use crate::error::{TransformError, TransformResult};
use crate::matcher::{is_image_call, props_of, src_literal, FactoryNames};
use crate::options::IdentifierStyle;
use crate::source::SourceRef;

// -----------------------------------------------------------------------------
// Snapshot
// -----------------------------------------------------------------------------

/// One distinct image, before any I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    /// First spelling of the reference seen in the document.
    pub reference: String,
    pub source: SourceRef,
    pub extension: String,
}

/// Distinct images in order of first appearance, plus how every raw `src`
/// string maps onto them.
#[derive(Debug, Default)]
pub struct ImagePlan {
    pub images: Vec<PendingImage>,
    by_reference: HashMap<String, usize>,
}

impl ImagePlan {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn index_of(&self, reference: &str) -> Option<usize> {
        self.by_reference.get(reference).copied()
    }

    fn add(&mut self, reference: String, base_dir: &Path, by_key: &mut HashMap<String, usize>) {
        if self.by_reference.contains_key(&reference) {
            return;
        }
        let source = SourceRef::classify(&reference, base_dir);
        let idx = *by_key.entry(source.key()).or_insert_with(|| {
            self.images.push(PendingImage {
                extension: source.extension(&reference),
                reference: reference.clone(),
                source,
            });
            self.images.len() - 1
        });
        self.by_reference.insert(reference, idx);
    }
}

struct SiteCollector<'a> {
    names: &'a FactoryNames,
    references: Vec<String>,
}

impl Visit for SiteCollector<'_> {
    fn visit_call_expr(&mut self, n: &CallExpr) {
        if is_image_call(n, self.names) {
            if let Some(props) = props_of(n) {
                self.references
                    .extend(props.props.iter().filter_map(src_literal));
            }
        }
        n.visit_children_with(self);
    }
}

/// Walks the whole program once and fixes the set of images to resolve.
pub fn plan_images(program: &Program, names: &FactoryNames, base_dir: &Path) -> ImagePlan {
    let mut collector = SiteCollector {
        names,
        references: Vec::new(),
    };
    program.visit_with(&mut collector);

    let mut plan = ImagePlan::default();
    let mut by_key = HashMap::new();
    for reference in collector.references {
        plan.add(reference, base_dir, &mut by_key);
    }
    plan
}

// -----------------------------------------------------------------------------
// Binding names
// -----------------------------------------------------------------------------

struct IdentCollector<'a> {
    out: &'a mut HashSet<String>,
}

impl Visit for IdentCollector<'_> {
    fn visit_ident(&mut self, n: &Ident) {
        self.out.insert(n.sym.to_string());
    }
}

/// Hands out binding names that collide with nothing in the document.
#[derive(Debug)]
pub struct NameGenerator {
    style: IdentifierStyle,
    used: HashSet<String>,
    counter: usize,
}

impl NameGenerator {
    pub fn for_program(program: &Program, style: IdentifierStyle) -> Self {
        let mut used = HashSet::new();
        program.visit_with(&mut IdentCollector { out: &mut used });
        Self {
            style,
            used,
            counter: 0,
        }
    }

    pub fn next_name(&mut self) -> String {
        loop {
            let candidate = match self.style {
                IdentifierStyle::Counter => {
                    self.counter += 1;
                    format!("static_image_{}", self.counter)
                }
                IdentifierStyle::Uuid => format!("__static_image_{}", Uuid::new_v4().simple()),
            };
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Records & rewrite
// -----------------------------------------------------------------------------

/// A resolved, cached image and the binding that imports it.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub reference: String,
    pub local: String,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl ImageRecord {
    /// `import <local> from "<path>"`
    pub fn import_decl(&self) -> ModuleItem {
        ModuleItem::ModuleDecl(ModuleDecl::Import(ImportDecl {
            span: DUMMY_SP,
            specifiers: vec![ImportSpecifier::Default(ImportDefaultSpecifier {
                span: DUMMY_SP,
                local: Ident::new(self.local.clone().into(), DUMMY_SP, SyntaxContext::empty()),
            })],
            src: Box::new(Str {
                span: DUMMY_SP,
                value: self.path.to_string_lossy().into_owned().into(),
                raw: None,
            }),
            type_only: false,
            with: None,
            phase: ImportPhase::Evaluation,
        }))
    }
}

struct SrcRewriter<'a> {
    names: &'a FactoryNames,
    plan: &'a ImagePlan,
    records: &'a [ImageRecord],
    rewritten: usize,
    missing: Option<String>,
}

impl SrcRewriter<'_> {
    fn binding_for(&mut self, reference: &str) -> Option<&str> {
        let (plan, records) = (self.plan, self.records);
        let record = plan.index_of(reference).and_then(|idx| records.get(idx));
        if record.is_none() && self.missing.is_none() {
            self.missing = Some(reference.to_string());
        }
        record.map(|r| r.local.as_str())
    }

    fn rewrite_props(&mut self, props: &mut [PropOrSpread]) {
        for prop in props.iter_mut() {
            let Some(reference) = src_literal(prop) else {
                continue;
            };
            let Some(local) = self.binding_for(&reference).map(str::to_string) else {
                continue;
            };
            *prop = PropOrSpread::Prop(Box::new(Prop::KeyValue(KeyValueProp {
                key: PropName::Ident(IdentName::new("src".into(), DUMMY_SP)),
                value: Box::new(Expr::Ident(Ident::new(
                    local.into(),
                    DUMMY_SP,
                    SyntaxContext::empty(),
                ))),
            })));
            self.rewritten += 1;
        }
    }
}

impl VisitMut for SrcRewriter<'_> {
    fn visit_mut_call_expr(&mut self, n: &mut CallExpr) {
        n.visit_mut_children_with(self);

        if !is_image_call(n, self.names) {
            return;
        }
        // args[0] (component) and args[2..] (children) stay as they are.
        if let Some(Expr::Object(props)) = n.args.get_mut(1).map(|a| &mut *a.expr) {
            self.rewrite_props(&mut props.props);
        }
    }
}

/// Points every qualifying `src` at its record's binding. `records[i]`
/// belongs to `plan.images[i]`. Returns the number of rewritten properties.
pub fn apply_rewrites(
    program: &mut Program,
    names: &FactoryNames,
    plan: &ImagePlan,
    records: &[ImageRecord],
) -> TransformResult<usize> {
    if records.len() != plan.images.len() {
        return Err(TransformError::MalformedMatch(format!(
            "{} images planned but {} resolved",
            plan.images.len(),
            records.len()
        )));
    }

    let mut rewriter = SrcRewriter {
        names,
        plan,
        records,
        rewritten: 0,
        missing: None,
    };
    program.visit_mut_with(&mut rewriter);

    match rewriter.missing {
        Some(reference) => Err(TransformError::MalformedMatch(format!(
            "no resolved image for src {reference:?}"
        ))),
        None => Ok(rewriter.rewritten),
    }
}
