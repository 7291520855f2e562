//! Type lowering.

use crate::ast::DeclKind;
use crate::diag::Span;
use crate::ir::IrType;
use crate::irgen::errors::IrGenErrorKind as GEK;
use crate::irgen::{IrGen, IrGenError};
use crate::mangle::mangle_type;
use crate::types::{ArraySize, Type};

fn builtin_ir_type(name: &str) -> Option<IrType> {
    match name {
        "void" => Some(IrType::Void),
        "bool" => Some(IrType::Int(1)),
        "char" => Some(IrType::Int(8)),
        "int" | "int32" | "uint" | "uint32" => Some(IrType::Int(32)),
        "int8" | "uint8" => Some(IrType::Int(8)),
        "int16" | "uint16" => Some(IrType::Int(16)),
        "int64" | "uint64" => Some(IrType::Int(64)),
        "float" | "float32" => Some(IrType::Float(32)),
        "float64" => Some(IrType::Float(64)),
        "float80" => Some(IrType::Float(80)),
        _ => None,
    }
}

impl IrGen<'_> {
    pub(crate) fn to_ir(&mut self, ty: &Type) -> Result<IrType, IrGenError> {
        match ty {
            Type::Basic {
                name, generic_args, ..
            } => {
                if name == "string" {
                    return Ok(self.string_type());
                }
                if let Some(builtin) = builtin_ir_type(name) {
                    return Ok(builtin);
                }

                let mangled = mangle_type(name, generic_args);
                if self.structs.contains_key(&mangled) {
                    return Ok(IrType::Struct(mangled));
                }

                // A bare name may be a generic parameter under substitution.
                if generic_args.is_empty() {
                    if let Some(substituted) = self.current_generic_args.get(name) {
                        return Ok(substituted.clone());
                    }
                }

                // A nominal type that has not been lowered yet: find its
                // declaration and lower it on demand.
                let decl = self
                    .session
                    .find_decls_everywhere(&mangled)
                    .into_iter()
                    .find(|&id| matches!(self.decl(id).kind, DeclKind::Type(_)));
                match decl {
                    Some(decl_id) => {
                        self.codegen_type_decl(decl_id)?;
                        Ok(IrType::Struct(mangled))
                    }
                    None => Err(GEK::UnloweredType(ty.clone()).at(Span::default())),
                }
            }
            Type::Array { elem, size } => match size {
                ArraySize::Fixed(len) => Ok(IrType::Array {
                    elem: Box::new(self.to_ir(elem)?),
                    len: *len,
                }),
                // Unsized arrays only exist behind pointers, which lower to
                // fat pointers.
                ArraySize::Unsized => Err(GEK::UnloweredType(ty.clone()).at(Span::default())),
            },
            Type::Range { .. } => Err(GEK::Unimplemented("range types").at(Span::default())),
            Type::Tuple { .. } => Err(GEK::Unimplemented("tuple types").at(Span::default())),
            Type::Function { .. } => {
                Err(GEK::Unimplemented("function types").at(Span::default()))
            }
            Type::Pointer { pointee, .. } => {
                if pointee.is_unsized_array() {
                    return self.fat_pointer_type(pointee.element_type());
                }
                if pointee.is_void() {
                    return Ok(IrType::Int(8).ptr_to());
                }
                Ok(self.to_ir(pointee)?.ptr_to())
            }
            Type::Optional { wrapped, .. } => {
                // Nullable pointers share their pointee's representation.
                if wrapped.is_pointer() {
                    self.to_ir(wrapped)
                } else {
                    Err(GEK::Unimplemented("optional value types").at(Span::default()))
                }
            }
            Type::Null => Err(GEK::UnloweredType(ty.clone()).at(Span::default())),
        }
    }

    /// `string` lowers as a `{char pointer, length}` aggregate.
    pub(crate) fn string_type(&mut self) -> IrType {
        if self.builder.module.struct_fields("string").is_none() {
            self.builder
                .module
                .add_struct("string", vec![IrType::Int(8).ptr_to(), IrType::Int(32)]);
        }
        IrType::Struct("string".to_string())
    }

    /// A pointer to an unsized array lowers as an `{element pointer, length}`
    /// fat pointer, one named aggregate per element type.
    pub(crate) fn fat_pointer_type(&mut self, elem: &Type) -> Result<IrType, IrGenError> {
        let elem_ir = self.to_ir(elem)?;
        let name = format!("slice.{elem_ir}");
        if self.builder.module.struct_fields(&name).is_none() {
            self.builder
                .module
                .add_struct(name.clone(), vec![elem_ir.ptr_to(), IrType::Int(32)]);
        }
        Ok(IrType::Struct(name))
    }
}
