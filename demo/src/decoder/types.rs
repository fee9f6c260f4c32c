//! Decoder types

use super::state::EntityState;
use crate::types::SendProp;

/// A serverclass's props after flattening.
///
/// `props` holds shallow copies of every reachable leaf prop, resolved
/// through baseclasses, collapsible tables, and excludes, in the order
/// delta field indices refer to them on the wire.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlatClass {
    /// Name of the root datatable the class was flattened from.
    pub dt_name: String,

    /// Leaf props in network decode order.
    pub props: Vec<SendProp>,
}

/// Hooks that alter how entity state is initialized.
#[derive(Default)]
pub struct DecoderSettings<'a> {
    /// Invoked with the entity state once every serverclass has been
    /// flattened. Installing a handler makes [`EntityState::init`] flatten
    /// every serverclass up front; leaving it unset defers flattening to
    /// the first [`EntityState::serverclass_data`] call per class.
    pub flattened_props_handler: Option<Box<dyn FnMut(&EntityState) + 'a>>,
}
