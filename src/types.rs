use std::fmt;

/// Number of elements in an array type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArraySize {
    Fixed(u64),
    /// Element count unknown at the type-use site; requires a fat pointer at
    /// the ABI boundary.
    Unsized,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// A nominal type: builtin scalar or user-defined, possibly with generic
    /// arguments. Scalar names never carry generic args.
    Basic {
        name: String,
        generic_args: Vec<Type>,
        mutable: bool,
    },
    Array {
        elem: Box<Type>,
        size: ArraySize,
    },
    Tuple {
        subtypes: Vec<Type>,
    },
    Function {
        return_type: Box<Type>,
        param_types: Vec<Type>,
    },
    Pointer {
        pointee: Box<Type>,
        mutable: bool,
    },
    Optional {
        wrapped: Box<Type>,
        mutable: bool,
    },
    /// Internal iterable type produced by range expressions.
    Range {
        elem: Box<Type>,
        exclusive: bool,
    },
    /// The type of the null literal, before conversion to an optional.
    Null,
}

pub const BUILTIN_SCALAR_NAMES: &[&str] = &[
    "void", "bool", "char", "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16",
    "uint32", "uint64", "float", "float32", "float64", "float80", "string",
];

pub fn is_builtin_scalar_name(name: &str) -> bool {
    BUILTIN_SCALAR_NAMES.contains(&name)
}

impl Type {
    pub fn basic(name: impl Into<String>) -> Type {
        Type::Basic {
            name: name.into(),
            generic_args: Vec::new(),
            mutable: false,
        }
    }

    pub fn basic_with_args(name: impl Into<String>, generic_args: Vec<Type>) -> Type {
        Type::Basic {
            name: name.into(),
            generic_args,
            mutable: false,
        }
    }

    pub fn void() -> Type {
        Type::basic("void")
    }

    pub fn bool() -> Type {
        Type::basic("bool")
    }

    pub fn char() -> Type {
        Type::basic("char")
    }

    pub fn int() -> Type {
        Type::basic("int")
    }

    pub fn int64() -> Type {
        Type::basic("int64")
    }

    pub fn uint64() -> Type {
        Type::basic("uint64")
    }

    pub fn float64() -> Type {
        Type::basic("float64")
    }

    pub fn string() -> Type {
        Type::basic("string")
    }

    pub fn array(elem: Type, size: ArraySize) -> Type {
        Type::Array {
            elem: Box::new(elem),
            size,
        }
    }

    pub fn sized_array(elem: Type, len: u64) -> Type {
        Type::array(elem, ArraySize::Fixed(len))
    }

    pub fn unsized_array(elem: Type) -> Type {
        Type::array(elem, ArraySize::Unsized)
    }

    pub fn tuple(subtypes: Vec<Type>) -> Type {
        Type::Tuple { subtypes }
    }

    pub fn function(return_type: Type, param_types: Vec<Type>) -> Type {
        Type::Function {
            return_type: Box::new(return_type),
            param_types,
        }
    }

    pub fn pointer(pointee: Type) -> Type {
        Type::Pointer {
            pointee: Box::new(pointee),
            mutable: false,
        }
    }

    pub fn mutable_pointer(pointee: Type) -> Type {
        Type::Pointer {
            pointee: Box::new(pointee),
            mutable: true,
        }
    }

    /// Wraps a type in an optional. `Optional(Optional(T))` is forbidden at
    /// construction, so wrapping an optional yields it unchanged.
    pub fn optional(wrapped: Type) -> Type {
        if wrapped.is_optional() {
            return wrapped;
        }
        Type::Optional {
            wrapped: Box::new(wrapped),
            mutable: false,
        }
    }

    pub fn range(elem: Type, exclusive: bool) -> Type {
        Type::Range {
            elem: Box::new(elem),
            exclusive,
        }
    }

    // Predicates

    pub fn is_basic(&self) -> bool {
        matches!(self, Type::Basic { .. })
    }

    pub fn is_builtin_scalar(&self) -> bool {
        matches!(self, Type::Basic { name, .. } if is_builtin_scalar_name(name))
    }

    pub fn is_named(&self, expected: &str) -> bool {
        matches!(self, Type::Basic { name, .. } if name == expected)
    }

    pub fn is_void(&self) -> bool {
        self.is_named("void")
    }

    pub fn is_bool(&self) -> bool {
        self.is_named("bool")
    }

    pub fn is_char(&self) -> bool {
        self.is_named("char")
    }

    pub fn is_string(&self) -> bool {
        self.is_named("string")
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            Type::Basic { name, .. }
                if matches!(name.as_str(), "int" | "int8" | "int16" | "int32" | "int64")
        )
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            Type::Basic { name, .. }
                if matches!(name.as_str(), "uint" | "uint8" | "uint16" | "uint32" | "uint64")
        )
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(
            self,
            Type::Basic { name, .. }
                if matches!(name.as_str(), "float" | "float32" | "float64" | "float80")
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    pub fn is_unsized_array(&self) -> bool {
        matches!(
            self,
            Type::Array {
                size: ArraySize::Unsized,
                ..
            }
        )
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Type::Tuple { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function { .. })
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Type::Optional { .. })
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Type::Range { .. })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Type::Null)
    }

    /// Mutability of the outer type slot. Not transitive into generic args,
    /// pointees, or wrapped types.
    pub fn is_mutable(&self) -> bool {
        match self {
            Type::Basic { mutable, .. }
            | Type::Pointer { mutable, .. }
            | Type::Optional { mutable, .. } => *mutable,
            _ => false,
        }
    }

    // Modifiers

    pub fn with_mutability(self, mutable: bool) -> Type {
        match self {
            Type::Basic {
                name, generic_args, ..
            } => Type::Basic {
                name,
                generic_args,
                mutable,
            },
            Type::Pointer { pointee, .. } => Type::Pointer { pointee, mutable },
            Type::Optional { wrapped, .. } => Type::Optional { wrapped, mutable },
            other => other,
        }
    }

    pub fn as_mutable(self) -> Type {
        self.with_mutability(true)
    }

    pub fn as_immutable(self) -> Type {
        self.with_mutability(false)
    }

    // Accessors

    pub fn name(&self) -> &str {
        match self {
            Type::Basic { name, .. } => name,
            _ => panic!("expected basic type, found {self}"),
        }
    }

    pub fn generic_args(&self) -> &[Type] {
        match self {
            Type::Basic { generic_args, .. } => generic_args,
            _ => &[],
        }
    }

    pub fn pointee(&self) -> &Type {
        match self {
            Type::Pointer { pointee, .. } => pointee,
            _ => panic!("expected pointer type, found {self}"),
        }
    }

    /// The pointee for pointers, `self` otherwise.
    pub fn remove_pointer(&self) -> &Type {
        match self {
            Type::Pointer { pointee, .. } => pointee,
            _ => self,
        }
    }

    pub fn wrapped_type(&self) -> &Type {
        match self {
            Type::Optional { wrapped, .. } => wrapped,
            _ => panic!("expected optional type, found {self}"),
        }
    }

    /// The wrapped type for optionals, `self` otherwise.
    pub fn remove_optional(&self) -> &Type {
        match self {
            Type::Optional { wrapped, .. } => wrapped,
            _ => self,
        }
    }

    pub fn element_type(&self) -> &Type {
        match self {
            Type::Array { elem, .. } => elem,
            _ => panic!("expected array type, found {self}"),
        }
    }

    pub fn array_size(&self) -> ArraySize {
        match self {
            Type::Array { size, .. } => *size,
            _ => panic!("expected array type, found {self}"),
        }
    }

    pub fn return_type(&self) -> &Type {
        match self {
            Type::Function { return_type, .. } => return_type,
            _ => panic!("expected function type, found {self}"),
        }
    }

    pub fn param_types(&self) -> &[Type] {
        match self {
            Type::Function { param_types, .. } => param_types,
            _ => panic!("expected function type, found {self}"),
        }
    }

    pub fn subtypes(&self) -> &[Type] {
        match self {
            Type::Tuple { subtypes } => subtypes,
            _ => panic!("expected tuple type, found {self}"),
        }
    }

    /// Defined only on ranges and arrays.
    pub fn iterable_element_type(&self) -> Option<&Type> {
        match self {
            Type::Range { elem, .. } => Some(elem),
            Type::Array { elem, .. } => Some(elem),
            _ => None,
        }
    }

    /// Integer width and signedness for builtin integer scalars.
    pub fn int_width(&self) -> Option<(u8, bool)> {
        let Type::Basic { name, .. } = self else {
            return None;
        };
        match name.as_str() {
            "int8" => Some((8, true)),
            "int16" => Some((16, true)),
            "int" | "int32" => Some((32, true)),
            "int64" => Some((64, true)),
            "uint8" => Some((8, false)),
            "uint16" => Some((16, false)),
            "uint" | "uint32" => Some((32, false)),
            "uint64" => Some((64, false)),
            _ => None,
        }
    }

    pub fn int_in_range(&self, value: i128) -> bool {
        let Some((bits, signed)) = self.int_width() else {
            return false;
        };
        if signed {
            let min = -(1i128 << (bits - 1));
            let max = (1i128 << (bits - 1)) - 1;
            value >= min && value <= max
        } else {
            let max = (1i128 << bits) - 1;
            value >= 0 && value <= max
        }
    }

    /// Rewrites every basic type named in `substitutions` to its binding,
    /// bottom-up. Used by generic instantiation.
    pub fn substitute(&self, substitutions: &indexmap::IndexMap<String, Type>) -> Type {
        match self {
            Type::Basic {
                name,
                generic_args,
                mutable,
            } => {
                if generic_args.is_empty() {
                    if let Some(bound) = substitutions.get(name) {
                        return bound.clone().with_mutability(*mutable || bound.is_mutable());
                    }
                }
                Type::Basic {
                    name: name.clone(),
                    generic_args: generic_args
                        .iter()
                        .map(|arg| arg.substitute(substitutions))
                        .collect(),
                    mutable: *mutable,
                }
            }
            Type::Array { elem, size } => Type::Array {
                elem: Box::new(elem.substitute(substitutions)),
                size: *size,
            },
            Type::Tuple { subtypes } => Type::Tuple {
                subtypes: subtypes.iter().map(|t| t.substitute(substitutions)).collect(),
            },
            Type::Function {
                return_type,
                param_types,
            } => Type::Function {
                return_type: Box::new(return_type.substitute(substitutions)),
                param_types: param_types
                    .iter()
                    .map(|t| t.substitute(substitutions))
                    .collect(),
            },
            Type::Pointer { pointee, mutable } => Type::Pointer {
                pointee: Box::new(pointee.substitute(substitutions)),
                mutable: *mutable,
            },
            Type::Optional { wrapped, mutable } => Type::Optional {
                wrapped: Box::new(wrapped.substitute(substitutions)),
                mutable: *mutable,
            },
            Type::Range { elem, exclusive } => Type::Range {
                elem: Box::new(elem.substitute(substitutions)),
                exclusive: *exclusive,
            },
            Type::Null => Type::Null,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Basic {
                name,
                generic_args,
                mutable,
            } => {
                if *mutable {
                    write!(f, "mutable ")?;
                }
                write!(f, "{name}")?;
                if !generic_args.is_empty() {
                    let args: Vec<String> = generic_args.iter().map(|a| a.to_string()).collect();
                    write!(f, "<{}>", args.join(", "))?;
                }
                Ok(())
            }
            Type::Array { elem, size } => match size {
                ArraySize::Fixed(len) => write!(f, "{elem}[{len}]"),
                ArraySize::Unsized => write!(f, "{elem}[]"),
            },
            Type::Tuple { subtypes } => {
                let parts: Vec<String> = subtypes.iter().map(|t| t.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
            Type::Function {
                return_type,
                param_types,
            } => {
                let parts: Vec<String> = param_types.iter().map(|t| t.to_string()).collect();
                write!(f, "({}) -> {}", parts.join(", "), return_type)
            }
            Type::Pointer { pointee, mutable } => {
                if *mutable {
                    write!(f, "mutable ")?;
                }
                write!(f, "{pointee}*")
            }
            Type::Optional { wrapped, mutable } => {
                if *mutable {
                    write!(f, "mutable ")?;
                }
                write!(f, "{wrapped}?")
            }
            Type::Range { elem, exclusive } => {
                if *exclusive {
                    write!(f, "Range<{elem}>")
                } else {
                    write!(f, "ClosedRange<{elem}>")
                }
            }
            Type::Null => write!(f, "null"),
        }
    }
}
