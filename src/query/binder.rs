//! Parameter binder.
//!
//! Walks the declared parameters of a call, sets paging and sorting arguments aside
//! and assigns the remaining arguments, in order, to the plan's tags. Each value is
//! coerced through [`coerce_argument`]; like-family leaves then get their wildcards.
//! Nothing is executed when binding fails.

use crate::error::{PartQueryError, Result};
use crate::executor::TagBinding;
use crate::query::compiler::{CompiledLeaf, QueryPlan};
use crate::query::sort::{Pageable, Sort};
use crate::value::{coerce_argument, Argument, ParamType, ValueConverter, WireType, WireValue};
use std::sync::Arc;

/// Result of binding one call's arguments
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundArguments {
    /// One binding per leaf, in tag order
    pub bindings: Vec<TagBinding>,
    pub sort: Option<Sort>,
    pub pageable: Option<Pageable>,
}

/// Bind runtime arguments to the tags of `plan`.
///
/// # Arguments
///
/// * `plan` - Compiled plan of the called method
/// * `args` - Runtime arguments, one per declared parameter
/// * `lookup` - Converter lookup for composite domain values
///
/// # Errors
///
/// - `SignatureMismatch` if `args` and the declared parameters differ in length
/// - `InvalidArgument` if a paging or sorting position holds something else
/// - `ArgumentCountMismatch` if the bindable arguments do not cover every tag exactly
/// - `UnsupportedParameterType` if a value has no wire representation
pub fn bind<L>(plan: &QueryPlan, args: &[Argument], lookup: L) -> Result<BoundArguments>
where
    L: Fn(&str) -> Option<Arc<dyn ValueConverter>>,
{
    let declared = plan.param_types();
    if args.len() != declared.len() {
        return Err(PartQueryError::SignatureMismatch {
            declared: declared.len(),
            supplied: args.len(),
        });
    }

    let mut bound = BoundArguments::default();
    let mut bindable = Vec::with_capacity(args.len());
    for (position, ((arg, ty), is_bindable)) in args
        .iter()
        .zip(declared)
        .zip(plan.bindable_mask())
        .enumerate()
    {
        if *is_bindable {
            bindable.push((arg, ty));
            continue;
        }
        match (ty, arg) {
            (ParamType::Pageable, Argument::Pageable(page)) => bound.pageable = Some(page.clone()),
            (ParamType::Sort, Argument::Sort(sort)) => bound.sort = Some(sort.clone()),
            // Null means unpaged or unsorted.
            (ParamType::Pageable | ParamType::Sort, Argument::Null) => {}
            _ => {
                return Err(PartQueryError::InvalidArgument {
                    position,
                    expected: ty.type_name(),
                    found: arg.kind_name(),
                })
            }
        }
    }

    if bindable.len() != plan.tag_count() {
        return Err(PartQueryError::ArgumentCountMismatch {
            tags: plan.tag_count(),
            params: bindable.len(),
        });
    }

    bound.bindings = plan
        .leaves()
        .iter()
        .zip(bindable)
        .map(|(leaf, (arg, ty))| bind_leaf(leaf, arg, ty, &lookup))
        .collect::<Result<Vec<_>>>()?;

    Ok(bound)
}

fn bind_leaf<L>(leaf: &CompiledLeaf, arg: &Argument, ty: &ParamType, lookup: &L) -> Result<TagBinding>
where
    L: Fn(&str) -> Option<Arc<dyn ValueConverter>>,
{
    let value = coerce_argument(&leaf.tag, arg, ty, lookup)?;

    let value = match (leaf.like_pattern(), value) {
        (Some(pattern), WireValue::String(s)) => WireValue::String(pattern.apply(&s)),
        (Some(_), WireValue::Null(t)) => WireValue::Null(t),
        (Some(_), other) => {
            return Err(PartQueryError::UnsupportedParameterType {
                tag: leaf.tag.clone(),
                type_name: format!("{} (expected STRING for {})", other.wire_type(), leaf.operator.type_name()),
            })
        }
        (None, value) => value,
    };

    if leaf.expects_array() && !matches!(value.wire_type(), WireType::Array(_)) {
        return Err(PartQueryError::UnsupportedParameterType {
            tag: leaf.tag.clone(),
            type_name: format!("{} (expected ARRAY for {})", value.wire_type(), leaf.operator.type_name()),
        });
    }

    Ok(TagBinding::new(leaf.tag.clone(), value))
}
