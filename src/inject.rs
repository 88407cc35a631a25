use swc_core::ecma::ast::*;
use tracing::warn;

/// Prepends `imports` to the program body, keeping their relative order and
/// placing all of them before every existing item.
pub fn inject_imports(program: &mut Program, imports: Vec<ModuleItem>) {
    if imports.is_empty() {
        return;
    }
    match program {
        Program::Module(m) => {
            m.body.splice(0..0, imports);
        }
        // Scripts cannot import the factory, so nothing was ever matched.
        Program::Script(_) => warn!(count = imports.len(), "Dropping imports for a script"),
    }
}
