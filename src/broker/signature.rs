//! Signature analysis: which kind of value each parameter of a wrapped
//! function needs, and how a function of a given shape is called.

use std::any::type_name;
use std::fmt;
use serde::de::DeserializeOwned;

use crate::broker::arguments::ArgumentScope;
use crate::broker::error::DispatchError;
use crate::broker::reply::Reply;
use crate::broker::strategy::{Decoder, Validator};
use crate::context::RequestContext;
use crate::parser::HttpRequest;
use crate::server::ResponseWriter;

/// The semantic kind of a wrapped function's parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// The request's [`RequestContext`].
    RequestContext,
    /// The (authenticated) [`HttpRequest`] itself.
    RawRequest,
    /// The [`ResponseWriter`] for this request.
    ResponseWriter,
    /// Anything else, produced by the [`Decoder`].
    DecodableBody,
}

/// One declared parameter of a wrapped function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    /// Zero-based position in the parameter list.
    pub position: usize,
    /// What the parameter is bound to.
    pub kind: ParamKind,
    /// The declared Rust type.
    pub type_name: &'static str,
}

/// The ordered parameter descriptors of a wrapped function.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    params: Vec<ParamDescriptor>,
}

impl Signature {
    /// Analyze the parameter list `Args`.
    pub fn of<Args: ParamList>() -> Self {
        Self { params: Args::describe() }
    }

    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    /// The kinds, in declared order.
    pub fn kinds(&self) -> Vec<ParamKind> {
        self.params.iter().map(|p| p.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match param.kind {
                ParamKind::DecodableBody => write!(f, "DecodableBody<{}>", param.type_name)?,
                kind => write!(f, "{kind:?}")?,
            }
        }
        f.write_str(")")
    }
}

/// A type a wrapped function may take as a parameter.
///
/// [`RequestContext`], [`HttpRequest`] and [`ResponseWriter`] are recognized
/// by type. Every other `DeserializeOwned` type is a
/// [`DecodableBody`](ParamKind::DecodableBody); indirections such as
/// `Box<T>` or `Option<T>` are decoded as that same handle.
pub trait Param: Sized + 'static {
    /// Classification of this type, fixed at compile time.
    const KIND: ParamKind;

    /// Produce the value for one request.
    fn synthesize<D: Decoder, V: Validator>(scope: &ArgumentScope<'_, D, V>) -> Result<Self, DispatchError>;
}

impl Param for RequestContext {
    const KIND: ParamKind = ParamKind::RequestContext;

    fn synthesize<D: Decoder, V: Validator>(scope: &ArgumentScope<'_, D, V>) -> Result<Self, DispatchError> {
        Ok(scope.context().clone())
    }
}

impl Param for HttpRequest {
    const KIND: ParamKind = ParamKind::RawRequest;

    fn synthesize<D: Decoder, V: Validator>(scope: &ArgumentScope<'_, D, V>) -> Result<Self, DispatchError> {
        Ok(scope.request().clone())
    }
}

impl Param for ResponseWriter {
    const KIND: ParamKind = ParamKind::ResponseWriter;

    fn synthesize<D: Decoder, V: Validator>(scope: &ArgumentScope<'_, D, V>) -> Result<Self, DispatchError> {
        Ok(scope.writer().clone())
    }
}

impl<T: DeserializeOwned + 'static> Param for T {
    const KIND: ParamKind = ParamKind::DecodableBody;

    fn synthesize<D: Decoder, V: Validator>(scope: &ArgumentScope<'_, D, V>) -> Result<Self, DispatchError> {
        scope.decode()
    }
}

/// A tuple of [`Param`]s: the full parameter list of a wrapped function.
pub trait ParamList: Sized {
    /// One descriptor per element, in order.
    fn describe() -> Vec<ParamDescriptor>;

    /// Build every element in declared order, stopping at the first failure.
    fn synthesize<D: Decoder, V: Validator>(
        signature: &Signature,
        scope: &mut ArgumentScope<'_, D, V>,
    ) -> Result<Self, DispatchError>;
}

/// A function a [`Broker`](crate::broker::Broker) can wrap.
///
/// Implemented for every `Fn(P1, .., Pn) -> R` with up to eight [`Param`]s
/// and a [`Reply`] return type.
pub trait Wrapped<Args>: Send + Sync + 'static {
    type Output: Reply;

    fn invoke(&self, args: Args) -> Self::Output;
}

macro_rules! impl_wrapped {
    ($($P:ident),*) => {
        impl<$($P: Param),*> ParamList for ($($P,)*) {
            fn describe() -> Vec<ParamDescriptor> {
                let params: &[(ParamKind, &'static str)] = &[$(($P::KIND, type_name::<$P>())),*];
                params
                    .iter()
                    .enumerate()
                    .map(|(position, &(kind, type_name))| ParamDescriptor { position, kind, type_name })
                    .collect()
            }

            #[allow(unused_variables, unused_mut)]
            fn synthesize<D: Decoder, V: Validator>(
                signature: &Signature,
                scope: &mut ArgumentScope<'_, D, V>,
            ) -> Result<Self, DispatchError> {
                let mut slots = signature.params().iter();
                Ok(($(scope.bind::<$P>(slots.next())?,)*))
            }
        }

        impl<Func, Ret, $($P),*> Wrapped<($($P,)*)> for Func
        where
            Func: Fn($($P),*) -> Ret + Send + Sync + 'static,
            Ret: Reply,
            $($P: Param,)*
        {
            type Output = Ret;

            #[allow(non_snake_case)]
            fn invoke(&self, ($($P,)*): ($($P,)*)) -> Ret {
                self($($P),*)
            }
        }
    };
}

impl_wrapped!();
impl_wrapped!(P1);
impl_wrapped!(P1, P2);
impl_wrapped!(P1, P2, P3);
impl_wrapped!(P1, P2, P3, P4);
impl_wrapped!(P1, P2, P3, P4, P5);
impl_wrapped!(P1, P2, P3, P4, P5, P6);
impl_wrapped!(P1, P2, P3, P4, P5, P6, P7);
impl_wrapped!(P1, P2, P3, P4, P5, P6, P7, P8);
