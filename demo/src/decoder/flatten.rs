//! Send-table flattening.
//!
//! A serverclass names a root datatable; the flattener walks that table's
//! tree of datatable props, resolves excludes, records baseclass
//! boundaries, and emits the reachable leaf props in the order the entity
//! delta decoder will index them.

use crate::decoder::types::FlatClass;
use crate::error::{Error, Result};
use crate::types::{
    DemoVersion, Game, SendProp, SendPropFlags, SendPropType, SendTable, ServerClass,
};
use log::trace;
use std::collections::{HashMap, HashSet};

/// Upper bound on the baseclass chain of a single serverclass. Blowing
/// through it means the table graph is corrupt; the walk aborts rather
/// than erroring.
const MAX_BASECLASSES: usize = 1024;

/// Transient state while flattening one serverclass.
///
/// Rebuilt for every serverclass, so exclude records never leak from one
/// class into the next. The string keys borrow from the sendtables that
/// outlive the walk.
struct PropData<'a> {
    /// Leaf props the gather pass will emit, counted by the size pass.
    max_props: usize,

    /// `(table name, prop name)` pairs removed from the flattened view.
    excluded_props: HashSet<(&'a str, &'a str)>,

    /// Tables with at least one excluded prop, letting the per-prop test
    /// skip the pair lookup for untouched tables.
    dts_with_excludes: HashSet<&'a str>,

    /// Baseclass table indices in gather order.
    baseclasses: Vec<u16>,

    /// Where the next baseclass at the current recursion depth lands in
    /// `baseclasses`.
    insert_cursor: usize,
}

impl<'a> PropData<'a> {
    fn new() -> Self {
        Self {
            max_props: 0,
            excluded_props: HashSet::new(),
            dts_with_excludes: HashSet::new(),
            baseclasses: Vec::new(),
            insert_cursor: 0,
        }
    }

    /// Record a baseclass at the cursor, pushing baseclasses recorded by
    /// enclosing recursion levels towards the back. A subtree's own
    /// baseclasses therefore end up in front of it, and the cursor is
    /// advanced past the subtree once it has been walked.
    fn add_baseclass(&mut self, index: u16) {
        assert!(
            self.baseclasses.len() < MAX_BASECLASSES,
            "baseclass chain exceeds {} entries",
            MAX_BASECLASSES
        );

        self.baseclasses.insert(self.insert_cursor, index);
    }

    fn is_excluded(&self, table: &SendTable, prop: &SendProp) -> bool {
        self.dts_with_excludes.contains(table.name.as_str())
            && self
                .excluded_props
                .contains(&(table.name.as_str(), prop.name.as_str()))
    }
}

/// Resolve the table a datatable prop points at, memoizing the index on
/// the prop so later passes skip the name lookup.
fn resolve_baseclass(dt_lookup: &HashMap<String, u16>, prop: &SendProp) -> Result<u16> {
    if let Some(index) = prop.baseclass.get() {
        return Ok(index);
    }

    let name = prop
        .dt_name
        .as_deref()
        .ok_or_else(|| Error::MissingTargetTable(prop.name.clone()))?;
    let index = *dt_lookup
        .get(name)
        .ok_or_else(|| Error::UnknownPropTable(name.to_owned()))?;

    prop.baseclass.set(Some(index));
    Ok(index)
}

/// Walk the table tree and record every exclude prop it declares.
fn gather_excludes<'a>(
    sendtables: &'a [SendTable],
    dt_lookup: &HashMap<String, u16>,
    data: &mut PropData<'a>,
    table_index: u16,
) -> Result<()> {
    let table = &sendtables[table_index as usize];

    for prop in &table.props {
        if prop.prop_type == SendPropType::DataTable {
            let baseclass = resolve_baseclass(dt_lookup, prop)?;
            gather_excludes(sendtables, dt_lookup, data, baseclass)?;
        } else if prop.flags.contains(SendPropFlags::EXCLUDE) {
            let target = prop
                .exclude_name
                .as_deref()
                .ok_or_else(|| Error::MissingTargetTable(prop.name.clone()))?;
            data.excluded_props.insert((target, prop.name.as_str()));
            data.dts_with_excludes.insert(target);
        }
    }

    Ok(())
}

/// Size pass: count the leaf props the gather pass will emit and record
/// the baseclass chain.
///
/// Collapsible datatable props are walked in place; every other datatable
/// prop is a baseclass boundary whose table flattens ahead of this one.
fn gather_propdata<'a>(
    sendtables: &'a [SendTable],
    dt_lookup: &HashMap<String, u16>,
    data: &mut PropData<'a>,
    table_index: u16,
) -> Result<()> {
    let table = &sendtables[table_index as usize];

    for prop in &table.props {
        if data.is_excluded(table, prop) {
            continue;
        }

        if prop.prop_type == SendPropType::DataTable {
            let baseclass = resolve_baseclass(dt_lookup, prop)?;

            if prop.flags.contains(SendPropFlags::COLLAPSIBLE) {
                gather_propdata(sendtables, dt_lookup, data, baseclass)?;
            } else {
                data.add_baseclass(baseclass);
                gather_propdata(sendtables, dt_lookup, data, baseclass)?;
                data.insert_cursor += 1;
            }
        } else if !prop
            .flags
            .intersects(SendPropFlags::INSIDE_ARRAY | SendPropFlags::EXCLUDE)
        {
            data.max_props += 1;
        }
    }

    Ok(())
}

/// Gather pass: append this table's surviving leaf props to the flat
/// array, recursing only into collapsible subtables. Baseclass tables are
/// handled by the caller from the recorded chain.
fn iterate_props<'a>(
    sendtables: &'a [SendTable],
    data: &PropData<'a>,
    table: &'a SendTable,
    out: &mut Vec<SendProp>,
) {
    for prop in &table.props {
        if prop.prop_type == SendPropType::DataTable {
            if prop.flags.contains(SendPropFlags::COLLAPSIBLE) {
                if let Some(baseclass) = prop.baseclass.get() {
                    iterate_props(sendtables, data, &sendtables[baseclass as usize], out);
                }
            }
        } else if !prop
            .flags
            .intersects(SendPropFlags::EXCLUDE | SendPropFlags::INSIDE_ARRAY)
            && !data.is_excluded(table, prop)
        {
            out.push(prop.clone());
        }
    }
}

/// Priority a prop sorts with under demo protocol 4, where frequently
/// changing props are pulled up to priority 64.
fn effective_priority(prop: &SendProp) -> u8 {
    if prop.priority >= 64 && prop.flags.contains(SendPropFlags::CHANGES_OFTEN) {
        64
    } else {
        prop.priority
    }
}

/// Sort flattened props into network decode order.
///
/// Protocol 4 demos sort ascending by effective priority. Older demos,
/// and Left 4 Dead which kept the old scheme, only move changes-often
/// props to the front. Both orders preserve the relative gather order of
/// props that compare equal.
fn sort_props(version: DemoVersion, props: &mut [SendProp]) {
    if version.demo_protocol >= 4 && version.game != Game::L4d {
        props.sort_by_key(effective_priority);
    } else {
        props.sort_by_key(|prop| !prop.flags.contains(SendPropFlags::CHANGES_OFTEN));
    }
}

/// Flatten one serverclass.
pub(crate) fn flatten_serverclass(
    sendtables: &[SendTable],
    dt_lookup: &HashMap<String, u16>,
    version: DemoVersion,
    class: &ServerClass,
) -> Result<FlatClass> {
    let dt_index = *dt_lookup
        .get(&class.datatable_name)
        .ok_or_else(|| Error::UnknownServerClassTable(class.datatable_name.clone()))?;

    let mut data = PropData::new();
    gather_excludes(sendtables, dt_lookup, &mut data, dt_index)?;
    trace!(
        "`{}`: {} excluded props across {} tables",
        class.class_name,
        data.excluded_props.len(),
        data.dts_with_excludes.len()
    );
    gather_propdata(sendtables, dt_lookup, &mut data, dt_index)?;

    let mut props = Vec::with_capacity(data.max_props);
    for &baseclass in &data.baseclasses {
        iterate_props(sendtables, &data, &sendtables[baseclass as usize], &mut props);
    }
    iterate_props(sendtables, &data, &sendtables[dt_index as usize], &mut props);

    sort_props(version, &mut props);

    Ok(FlatClass {
        dt_name: sendtables[dt_index as usize].name.clone(),
        props,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROTOCOL4: DemoVersion = DemoVersion {
        demo_protocol: 4,
        game: Game::OrangeBox,
    };

    const PROTOCOL3: DemoVersion = DemoVersion {
        demo_protocol: 3,
        game: Game::HalfLife2,
    };

    fn leaf(name: &str, priority: u8, flags: SendPropFlags) -> SendProp {
        SendProp {
            name: name.to_owned(),
            priority,
            flags,
            ..SendProp::default()
        }
    }

    fn names(props: &[SendProp]) -> Vec<&str> {
        props.iter().map(|prop| prop.name.as_str()).collect()
    }

    #[test]
    fn changes_often_caps_priority_at_64() {
        assert_eq!(
            10,
            effective_priority(&leaf("a", 10, SendPropFlags::CHANGES_OFTEN))
        );
        assert_eq!(
            64,
            effective_priority(&leaf("b", 70, SendPropFlags::CHANGES_OFTEN))
        );
        assert_eq!(70, effective_priority(&leaf("c", 70, SendPropFlags::empty())));
        assert_eq!(
            64,
            effective_priority(&leaf("d", 200, SendPropFlags::CHANGES_OFTEN))
        );
    }

    #[test]
    fn protocol4_sorts_by_effective_priority() {
        let mut props = vec![
            leaf("p2", 70, SendPropFlags::CHANGES_OFTEN),
            leaf("p1", 10, SendPropFlags::empty()),
            leaf("p3", 64, SendPropFlags::empty()),
        ];

        sort_props(PROTOCOL4, &mut props);
        assert_eq!(vec!["p1", "p2", "p3"], names(&props));
    }

    #[test]
    fn legacy_sort_moves_changes_often_first() {
        let mut props = vec![
            leaf("p1", 10, SendPropFlags::empty()),
            leaf("p2", 70, SendPropFlags::CHANGES_OFTEN),
            leaf("p3", 5, SendPropFlags::empty()),
            leaf("p4", 1, SendPropFlags::CHANGES_OFTEN),
        ];

        sort_props(PROTOCOL3, &mut props);
        assert_eq!(vec!["p2", "p4", "p1", "p3"], names(&props));
    }

    #[test]
    fn l4d_keeps_the_legacy_sort() {
        let mut props = vec![
            leaf("p1", 10, SendPropFlags::empty()),
            leaf("p2", 70, SendPropFlags::CHANGES_OFTEN),
        ];

        let version = DemoVersion {
            demo_protocol: 4,
            game: Game::L4d,
        };
        sort_props(version, &mut props);
        assert_eq!(vec!["p2", "p1"], names(&props));
    }

    #[test]
    fn baseclasses_insert_at_the_cursor() {
        let mut data = PropData::new();

        // Mirrors walking root props B then C, where B's table contains a
        // further baseclass D.
        data.add_baseclass(1);
        data.add_baseclass(2);
        data.insert_cursor += 1;
        data.insert_cursor += 1;
        data.add_baseclass(3);

        assert_eq!(vec![2, 1, 3], data.baseclasses);
    }
}
