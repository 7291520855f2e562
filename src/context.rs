use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{Decl, DeclId, DeclKind, DeclTable, FunctionKind, ModuleId, NodeIdGen};
use crate::mangle::mangle_member;
use crate::symtab::{Module, SourceFile};

/// Identifies a source file within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRef {
    pub module: ModuleId,
    pub file: usize,
}

/// Per-compilation state: the declaration table, all modules, and the cache
/// of modules imported from foreign headers (keyed by header name).
///
/// The original kept the backend context and imported-modules map as process
/// globals; here they are owned by one session passed explicitly.
#[derive(Debug, Default)]
pub struct Session {
    pub decl_table: DeclTable,
    pub node_ids: NodeIdGen,
    modules: Vec<Module>,
    pub imported_headers: IndexMap<String, ModuleId>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, name: impl Into<String>) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(Module::new(name));
        id
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.index()]
    }

    pub fn add_file(&mut self, module: ModuleId, path: impl Into<String>) -> FileRef {
        let files = &mut self.module_mut(module).files;
        files.push(SourceFile::new(path));
        FileRef {
            module,
            file: files.len() - 1,
        }
    }

    pub fn file(&self, file: FileRef) -> &SourceFile {
        &self.module(file.module).files[file.file]
    }

    pub fn file_mut(&mut self, file: FileRef) -> &mut SourceFile {
        &mut self.modules[file.module.index()].files[file.file]
    }

    pub fn decl(&self, id: DeclId) -> Rc<Decl> {
        Rc::clone(self.decl_table.get(id))
    }

    /// Registers a declaration in its module's symbol table under each name
    /// by which it should be findable: members under `Recv.name` (and, for
    /// plain methods, their bare name too, so sibling calls through an
    /// implicit `this` resolve), initializers under `Recv.init`,
    /// deinitializers under `Recv.deinit`, everything else under its bare
    /// name.
    pub fn add_to_symbol_table(&mut self, decl_id: DeclId) {
        let decl = self.decl(decl_id);
        for key in self.symbol_keys(&decl) {
            self.module_mut(decl.module).symbols.add(key, decl_id);
        }
    }

    /// Registers a declaration under an explicit key, used for generic type
    /// instantiations registered under their mangled name.
    pub fn add_to_symbol_table_as(&mut self, decl_id: DeclId, key: impl Into<String>) {
        let module = self.decl_table.get(decl_id).module;
        self.module_mut(module).symbols.add(key, decl_id);
    }

    fn symbol_keys(&self, decl: &Decl) -> Vec<String> {
        if let DeclKind::Function(func) = &decl.kind {
            if let Some(receiver) = func.receiver {
                let receiver = self.decl_table.get(receiver);
                let receiver_name = match receiver.as_type() {
                    Some(type_decl) => {
                        crate::mangle::mangle_type(&receiver.name, &type_decl.generic_args)
                    }
                    None => receiver.name.clone(),
                };
                return match func.kind {
                    FunctionKind::Init => vec![mangle_member(&receiver_name, "init")],
                    FunctionKind::Deinit => vec![mangle_member(&receiver_name, "deinit")],
                    _ => vec![
                        mangle_member(&receiver_name, &decl.name),
                        decl.name.clone(),
                    ],
                };
            }
        }
        vec![decl.name.clone()]
    }

    /// Resolves a name from a source file: the file's own module first, then
    /// each imported module in order. The first non-empty result wins, except
    /// that function overloads contributed by several modules are
    /// concatenated.
    pub fn find_decls(&self, file: FileRef, name: &str) -> Vec<DeclId> {
        let own_module = self.module(file.module);
        let name = own_module.symbols.apply_replacements(name).to_string();

        let mut results: Vec<DeclId> = Vec::new();
        let module_ids = std::iter::once(file.module).chain(self.file(file).imports.iter().copied());

        for module_id in module_ids {
            let module = self.module(module_id);
            let name = module.symbols.apply_replacements(&name);
            let found = module.symbols.find(name);
            if found.is_empty() {
                continue;
            }
            if results.is_empty() {
                results.extend_from_slice(found);
            } else if self.all_function_like(&results) && self.all_function_like(found) {
                results.extend_from_slice(found);
            } else {
                break;
            }
        }
        results
    }

    /// Looks a name up across every module, used by the IR generator when
    /// resolving deinitializers and struct layouts on demand.
    pub fn find_decls_everywhere(&self, name: &str) -> Vec<DeclId> {
        for module in &self.modules {
            let found = module.symbols.find(name);
            if !found.is_empty() {
                return found.to_vec();
            }
        }
        Vec::new()
    }

    /// Restricts a lookup to members whose receiver matches the given type
    /// decl. Non-function entries pass through untouched.
    pub fn find_decls_with_receiver(
        &self,
        file: FileRef,
        name: &str,
        receiver: DeclId,
    ) -> Vec<DeclId> {
        self.find_decls(file, name)
            .into_iter()
            .filter(|&id| match &self.decl_table.get(id).kind {
                DeclKind::Function(func) => func.receiver == Some(receiver),
                _ => true,
            })
            .collect()
    }

    fn all_function_like(&self, decls: &[DeclId]) -> bool {
        decls.iter().all(|&id| {
            matches!(
                self.decl_table.get(id).kind,
                DeclKind::Function(_) | DeclKind::FunctionTemplate(_)
            )
        })
    }
}
