//! Entity decoder state.

use crate::decoder::flatten;
use crate::decoder::types::{DecoderSettings, FlatClass};
use crate::error::{Error, Result};
use crate::types::{DemoVersion, SendTable, ServerClass};
use log::debug;
use std::collections::HashMap;

/// All state necessary to decode entity updates from a demo.
///
/// The state owns the parsed send tables and serverclasses and produces
/// one [`FlatClass`] per serverclass, either eagerly from
/// [`init`](Self::init) when a flattened-props handler is installed, or
/// lazily on the first [`serverclass_data`](Self::serverclass_data) call
/// for a class. Lazy flattening keeps demos whose consumers never look at
/// entity data cheap to skim.
#[derive(Debug)]
pub struct EntityState {
    /// Parsed send tables, in the order they appeared in the demo.
    sendtables: Vec<SendTable>,

    /// Parsed serverclasses, in class id order.
    serverclasses: Vec<ServerClass>,

    /// Header versioning that selects the prop sort order.
    version: DemoVersion,

    /// Datatable name to `sendtables` index.
    dt_lookup: HashMap<String, u16>,

    /// Flattened prop arrays, one slot per serverclass, filled on demand.
    class_datas: Vec<Option<FlatClass>>,
}

impl EntityState {
    /// Build entity state from parsed tables.
    ///
    /// Indexes every datatable by name up front. A duplicate table name is
    /// a structural error, since serverclasses and datatable props
    /// reference tables by name alone.
    pub fn new(
        sendtables: Vec<SendTable>,
        serverclasses: Vec<ServerClass>,
        version: DemoVersion,
    ) -> Result<Self> {
        let mut dt_lookup = HashMap::with_capacity(sendtables.len());
        for (index, table) in sendtables.iter().enumerate() {
            if dt_lookup.insert(table.name.clone(), index as u16).is_some() {
                return Err(Error::DuplicateDataTable(table.name.clone()));
            }
        }
        debug!("indexed {} datatables", dt_lookup.len());

        let class_datas = vec![None; serverclasses.len()];

        Ok(Self {
            sendtables,
            serverclasses,
            version,
            dt_lookup,
            class_datas,
        })
    }

    /// Parsed send tables.
    pub fn sendtables(&self) -> &[SendTable] {
        &self.sendtables
    }

    /// Parsed serverclasses, in class id order.
    pub fn serverclasses(&self) -> &[ServerClass] {
        &self.serverclasses
    }

    /// Flattened props for serverclass `index`, if that class has been
    /// flattened yet.
    pub fn flattened_class(&self, index: usize) -> Option<&FlatClass> {
        self.class_datas[index].as_ref()
    }

    /// Flatten every serverclass now.
    pub fn flatten_all(&mut self) -> Result<()> {
        for index in 0..self.serverclasses.len() {
            self.serverclass_data(index)?;
        }

        Ok(())
    }

    /// Run the post-parse initialization step.
    ///
    /// When a flattened-props handler is installed, every serverclass is
    /// flattened up front and the handler is invoked once with the
    /// finished state. Without one, flattening is deferred to
    /// [`serverclass_data`](Self::serverclass_data).
    pub fn init(&mut self, settings: &mut DecoderSettings<'_>) -> Result<()> {
        if let Some(handler) = settings.flattened_props_handler.as_mut() {
            self.flatten_all()?;
            handler(self);
        }

        Ok(())
    }

    /// Flattened props for serverclass `index`.
    ///
    /// The first call for an index runs the flattening walk; later calls
    /// return the stored result untouched.
    pub fn serverclass_data(&mut self, index: usize) -> Result<&FlatClass> {
        if self.class_datas[index].is_none() {
            let class_data = flatten::flatten_serverclass(
                &self.sendtables,
                &self.dt_lookup,
                self.version,
                &self.serverclasses[index],
            )?;
            debug!(
                "flattened serverclass {} `{}`: {} props from `{}`",
                index,
                self.serverclasses[index].class_name,
                class_data.props.len(),
                class_data.dt_name
            );
            self.class_datas[index] = Some(class_data);
        }

        Ok(self.class_datas[index]
            .as_ref()
            .expect("serverclass flattened above"))
    }
}
