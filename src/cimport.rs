//! Foreign header import.
//!
//! The actual header parser is an external collaborator behind the
//! `HeaderLoader` trait; this adapter maps its already-parsed declarations
//! into a synthetic module, registers it in the session-wide header cache,
//! and pushes it onto the importing file's import list.

use thiserror::Error;

use crate::ast::{
    DeclKind, EnumCase, EnumDecl, Expr, ExprKind, FieldDecl, FunctionDecl, FunctionKind,
    ModuleId, ParamDecl, TypeDecl, TypeTag, VarDecl,
};
use crate::context::{FileRef, Session};
use crate::diag::{Span, SpannedError};
use crate::types::Type;

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub search_paths: Vec<String>,
    pub framework_paths: Vec<String>,
    pub defines: Vec<String>,
    pub cflags: Vec<String>,
}

/// A declaration exported by a foreign header, already mapped to this
/// compiler's type model by the loader.
#[derive(Debug, Clone)]
pub enum ForeignItem {
    Function {
        name: String,
        params: Vec<(String, Type)>,
        return_type: Type,
        variadic: bool,
        asm_label: Option<String>,
    },
    Record {
        name: String,
        union: bool,
        fields: Vec<(String, Type)>,
    },
    Enum {
        name: String,
        cases: Vec<(String, i128)>,
    },
    /// A typedef alias, folded into the referenced basic type's name.
    Typedef { name: String, target: Type },
    Var { name: String, ty: Type },
    /// An object-like macro whose single replacement token is an identifier.
    MacroIdentifier { name: String, replacement: String },
    MacroInt { name: String, value: i128 },
    MacroFloat { name: String, value: f64 },
}

/// The external header parser. Given a header name and search options it
/// yields the header's exported declarations, or a diagnostic.
pub trait HeaderLoader {
    fn load(&mut self, header: &str, options: &ImportOptions) -> Result<Vec<ForeignItem>, String>;
}

#[derive(Debug, Clone, Error)]
pub enum ImportErrorKind {
    #[error("couldn't find C header file '{0}'")]
    HeaderNotFound(String),

    #[error("error while importing '{0}': {1}")]
    ForeignDiagnostics(String, String),
}

pub type ImportError = SpannedError<ImportErrorKind>;

impl ImportErrorKind {
    pub fn at(self, span: Span) -> ImportError {
        ImportError::new(self, span)
    }
}

/// Selects the builtin integer type for a foreign integer of the given
/// width. Loaders use this to map target-dependent C types.
pub fn int_type_by_width(bits: u32, signed: bool) -> Type {
    match (bits, signed) {
        (8, true) => Type::basic("int8"),
        (8, false) => Type::basic("uint8"),
        (16, true) => Type::basic("int16"),
        (16, false) => Type::basic("uint16"),
        (32, true) => Type::basic("int32"),
        (32, false) => Type::basic("uint32"),
        (64, true) => Type::basic("int64"),
        (64, false) => Type::basic("uint64"),
        _ => panic!("unsupported integer width {bits}"),
    }
}

/// Imports a foreign header into the session, reusing the cached module when
/// the header was imported before.
pub fn import_foreign_header(
    session: &mut Session,
    importer: FileRef,
    header: &str,
    options: &ImportOptions,
    loader: &mut dyn HeaderLoader,
    span: Span,
) -> Result<ModuleId, ImportError> {
    if let Some(&cached) = session.imported_headers.get(header) {
        session.file_mut(importer).imports.push(cached);
        return Ok(cached);
    }

    let items = loader
        .load(header, options)
        .map_err(|message| {
            ImportErrorKind::ForeignDiagnostics(header.to_string(), message).at(span)
        })?;

    let module = session.add_module(header);
    for item in items {
        add_foreign_item(session, module, item);
    }

    session
        .imported_headers
        .insert(header.to_string(), module);
    session.file_mut(importer).imports.push(module);
    Ok(module)
}

fn add_foreign_item(session: &mut Session, module: ModuleId, item: ForeignItem) {
    match item {
        ForeignItem::Function {
            name,
            params,
            return_type,
            variadic,
            asm_label,
        } => {
            // Redeclarations are common in headers; the first one wins.
            if session.module(module).symbols.contains(&name) {
                return;
            }
            let param_decls = params
                .into_iter()
                .map(|(param_name, ty)| {
                    session
                        .decl_table
                        .add(param_name, module, DeclKind::Param(ParamDecl { ty }))
                })
                .collect();
            let decl = session.decl_table.add(
                name,
                module,
                DeclKind::Function(FunctionDecl {
                    kind: FunctionKind::Free,
                    receiver: None,
                    params: param_decls,
                    return_type,
                    body: None,
                    mutating: false,
                    variadic,
                    is_extern: true,
                    asm_label,
                }),
            );
            session.add_to_symbol_table(decl);
        }
        ForeignItem::Record {
            name,
            union,
            fields,
        } => {
            if session.module(module).symbols.contains(&name) {
                return;
            }
            let field_decls = fields
                .into_iter()
                .map(|(field_name, ty)| {
                    session
                        .decl_table
                        .add(field_name, module, DeclKind::Field(FieldDecl { ty }))
                })
                .collect();
            let decl = session.decl_table.add(
                name,
                module,
                DeclKind::Type(TypeDecl {
                    tag: if union { TypeTag::Union } else { TypeTag::Struct },
                    fields: field_decls,
                    methods: Vec::new(),
                    generic_params: Vec::new(),
                    generic_args: Vec::new(),
                    pass_by_value: true,
                    interface: false,
                }),
            );
            session.add_to_symbol_table(decl);
        }
        ForeignItem::Enum { name, cases } => {
            // Each enumerator becomes an integer constant in the symbol
            // table alongside the enum itself.
            for (case_name, value) in &cases {
                add_integer_constant(session, module, case_name.clone(), *value);
            }
            let decl = session.decl_table.add(
                name,
                module,
                DeclKind::Enum(EnumDecl {
                    cases: cases
                        .into_iter()
                        .map(|(case_name, value)| EnumCase {
                            name: case_name,
                            value,
                        })
                        .collect(),
                }),
            );
            session.add_to_symbol_table(decl);
        }
        ForeignItem::Typedef { name, target } => {
            if target.is_basic() {
                let target_name = target.name().to_string();
                session
                    .module_mut(module)
                    .symbols
                    .add_identifier_replacement(name, target_name);
            }
        }
        ForeignItem::Var { name, ty } => {
            let mutable = ty.is_mutable();
            let decl = session.decl_table.add(
                name,
                module,
                DeclKind::Var(VarDecl {
                    ty: Some(ty),
                    initializer: None,
                    mutable,
                }),
            );
            session.add_to_symbol_table(decl);
        }
        ForeignItem::MacroIdentifier { name, replacement } => {
            session
                .module_mut(module)
                .symbols
                .add_identifier_replacement(name, replacement);
        }
        ForeignItem::MacroInt { name, value } => {
            add_integer_constant(session, module, name, value);
        }
        ForeignItem::MacroFloat { name, value } => {
            let initializer = Expr::new(
                &mut session.node_ids,
                ExprKind::FloatLit { value },
                Span::default(),
            );
            let decl = session.decl_table.add(
                name,
                module,
                DeclKind::Var(VarDecl {
                    ty: Some(Type::float64()),
                    initializer: Some(initializer),
                    mutable: false,
                }),
            );
            session.add_to_symbol_table(decl);
        }
    }
}

fn add_integer_constant(session: &mut Session, module: ModuleId, name: String, value: i128) {
    let initializer = Expr::new(
        &mut session.node_ids,
        ExprKind::IntLit { value },
        Span::default(),
    );
    let ty = if Type::int().int_in_range(value) {
        Type::int()
    } else {
        Type::int64()
    };
    let decl = session.decl_table.add(
        name,
        module,
        DeclKind::Var(VarDecl {
            ty: Some(ty),
            initializer: Some(initializer),
            mutable: false,
        }),
    );
    session.add_to_symbol_table(decl);
}
