//! Orchestrates parse → bundle → type-check → codegen into the one entry
//! point the CLI drives (§2, §4.6 expansion).

use std::collections::VecDeque;
use std::rc::Rc;

use ember_ast::arena::Arena;
use ember_ast::lexer::Lexer;
use ember_ast::nodes::Statement;
use ember_ast::parser::Parser;
use ember_type_checker::typed_context::TypedContext;
use ember_type_checker::TypeCheckerBuilder;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::host::Host;
use crate::manifest::StdlibManifest;

/// One compilation. Deliberately not `Clone` and not `Default`: §5 requires
/// a fresh value per compilation rather than a reentrant shared instance.
pub struct Compiler<H: Host> {
    host: H,
    manifest: StdlibManifest,
}

impl<H: Host> Compiler<H> {
    #[must_use]
    pub fn new(host: H, manifest: StdlibManifest) -> Self {
        Compiler { host, manifest }
    }

    /// Parses `entry` and every module it transitively imports into one
    /// bundled [`Arena`], so the checker and codegen always see a single
    /// logical program.
    ///
    /// # Errors
    ///
    /// Returns an error if resolution, loading, or parsing fails for the
    /// entry module or any transitive import, or if a `std:` import names a
    /// module the manifest doesn't list as public.
    pub fn bundle(&self, entry: &str) -> anyhow::Result<Arena> {
        let mut loaded: FxHashMap<String, Rc<str>> = FxHashMap::default();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut queue: VecDeque<(String, Option<String>)> = VecDeque::new();

        let resolved_entry = self.host.resolve(entry, None)?;
        seen.insert(resolved_entry.clone());
        queue.push_back((resolved_entry, None));

        let mut arena = Arena::default();
        while let Some((resolved, _referrer)) = queue.pop_front() {
            if resolved.starts_with("std:") && !self.manifest.is_public(&resolved) {
                anyhow::bail!("module not found: {resolved:?}");
            }

            let source: Rc<str> = match loaded.get(&resolved) {
                Some(cached) => cached.clone(),
                None => {
                    let text: Rc<str> = self.host.load(&resolved)?.into();
                    loaded.insert(resolved.clone(), text.clone());
                    text
                }
            };

            let tokens = Lexer::new(&source).tokenize()?;
            let (next_arena, source_file) =
                Parser::continue_in(&tokens, &resolved, arena).parse_source_file()?;
            arena = next_arena;

            for statement in &source_file.statements {
                if let Statement::Import(import) = statement {
                    let child = self.host.resolve(&import.spec, Some(&resolved))?;
                    if seen.insert(child.clone()) {
                        queue.push_back((child, Some(resolved.clone())));
                    }
                }
            }
        }

        Ok(arena)
    }

    /// Bundles and type-checks `entry`, returning the typed program.
    ///
    /// # Errors
    ///
    /// Returns an error if bundling fails, or the accumulated checker
    /// diagnostics as a single error if checking finds problems.
    pub fn check(&self, entry: &str) -> anyhow::Result<TypedContext> {
        let arena = self.bundle(entry)?;
        let builder = TypeCheckerBuilder::build_typed_context(arena)?;
        Ok(builder.typed_context())
    }

    /// Runs the full pipeline through codegen, producing WASM-GC bytes.
    ///
    /// # Errors
    ///
    /// Returns an error from any stage: bundling, type checking, or
    /// codegen.
    pub fn build(&self, entry: &str) -> anyhow::Result<Vec<u8>> {
        let typed = self.check(entry)?;
        ember_wasm_codegen::codegen(&typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use std::collections::HashMap;

    fn host_with(entry_src: &str) -> MemoryHost {
        let mut modules = HashMap::new();
        modules.insert("main".to_string(), entry_src.to_string());
        MemoryHost::new(modules)
    }

    #[test]
    fn bundles_single_module_entry() {
        let compiler = Compiler::new(host_with("export let run = () => 1;"), StdlibManifest::default());
        let arena = compiler.bundle("main").unwrap();
        assert_eq!(arena.source_files().len(), 1);
    }

    #[test]
    fn bundles_relative_imports_into_one_arena() {
        let mut modules = HashMap::new();
        modules.insert("main".to_string(), "import { helper } from \"./util\";\nexport let run = () => helper();".to_string());
        modules.insert("util".to_string(), "export let helper = () => 1;".to_string());
        let compiler = Compiler::new(MemoryHost::new(modules), StdlibManifest::default());
        let arena = compiler.bundle("main").unwrap();
        assert_eq!(arena.source_files().len(), 2);
    }

    #[test]
    fn unknown_stdlib_module_is_rejected() {
        let compiler = Compiler::new(
            host_with("import { x } from \"std:nonexistent\";\nexport let run = () => 1;"),
            StdlibManifest::default(),
        );
        assert!(compiler.bundle("main").is_err());
    }
}
