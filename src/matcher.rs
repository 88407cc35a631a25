use std::collections::HashSet;

use regex::Regex;
use swc_core::ecma::{
    ast::*,
    visit::{Visit, VisitWith},
};

/// Local names bound to the JSX element factory in one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactoryNames(HashSet<String>);

impl FactoryNames {
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<S: Into<String>> FromIterator<S> for FactoryNames {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// -----------------------------------------------------------------------------
// Factory discovery
// -----------------------------------------------------------------------------

struct FactoryCollector<'a> {
    pattern: &'a Regex,
    out: HashSet<String>,
}

impl Visit for FactoryCollector<'_> {
    // Specifiers have nothing nested worth visiting.
    fn visit_import_decl(&mut self, n: &ImportDecl) {
        for s in &n.specifiers {
            if let ImportSpecifier::Named(named) = s {
                let imported = match &named.imported {
                    Some(ModuleExportName::Ident(i)) => i.sym.to_string(),
                    Some(ModuleExportName::Str(s)) => s.value.to_string(),
                    None => named.local.sym.to_string(),
                };
                if self.pattern.is_match(&imported) {
                    self.out.insert(named.local.sym.to_string());
                }
            }
        }
    }
}

/// `import { jsx as _jsx, jsxs as _jsxs } from "react/jsx-runtime"` yields
/// `{_jsx, _jsxs}` under the default `^jsxs?$` pattern.
pub fn find_factory_identifiers(program: &Program, pattern: &Regex) -> FactoryNames {
    let mut collector = FactoryCollector {
        pattern,
        out: HashSet::new(),
    };
    program.visit_with(&mut collector);
    FactoryNames(collector.out)
}

// -----------------------------------------------------------------------------
// Call-site shape
// -----------------------------------------------------------------------------

/// `factory(x.img, { ... }, ...rest)` where `factory` is a known factory.
pub fn is_image_call(call: &CallExpr, names: &FactoryNames) -> bool {
    let callee_matches = match &call.callee {
        Callee::Expr(expr) => match &**expr {
            Expr::Ident(id) => names.contains(id.sym.as_ref()),
            _ => false,
        },
        _ => false,
    };
    if !callee_matches {
        return false;
    }

    let component_matches = match call.args.first() {
        Some(ExprOrSpread { spread: None, expr }) => match &**expr {
            Expr::Member(m) => matches!(&m.prop, MemberProp::Ident(p) if p.sym.as_ref() == "img"),
            _ => false,
        },
        _ => false,
    };

    component_matches
        && matches!(
            call.args.get(1),
            Some(ExprOrSpread { spread: None, expr }) if matches!(&**expr, Expr::Object(_))
        )
}

/// The string value of a `src: "<literal>"` property, if `prop` is one.
pub fn src_literal(prop: &PropOrSpread) -> Option<String> {
    let PropOrSpread::Prop(p) = prop else {
        return None;
    };
    let Prop::KeyValue(kv) = &**p else {
        return None;
    };
    match (&kv.key, &*kv.value) {
        (PropName::Ident(key), Expr::Lit(Lit::Str(s))) if key.sym.as_ref() == "src" => {
            Some(s.value.to_string())
        }
        _ => None,
    }
}

/// The props object of a call already known to satisfy [`is_image_call`].
pub fn props_of(call: &CallExpr) -> Option<&ObjectLit> {
    match call.args.get(1).map(|a| &*a.expr) {
        Some(Expr::Object(o)) => Some(o),
        _ => None,
    }
}
