//! Wires a [`Gateway`] to the simulated collaborators from a [`Config`].

use std::sync::Arc;

use pvgate_core::Gateway;
use pvgate_sim::{SimAddressSpace, SimContext};
use pvgate_types::{Field, NodeId, RemoteValue, Variant};
use tracing::info;

use crate::config::{Config, MappingEntry, PvKind};

/// Everything the process keeps alive while the gateway runs.
pub struct Bootstrap {
    pub context: Arc<SimContext>,
    pub address_space: Arc<SimAddressSpace>,
    pub gateway: Arc<Gateway>,
}

/// Build the simulated server, the address space and a stopped gateway
/// with every `[[mapping]]` registered.
pub fn build(cfg: &Config) -> Result<Bootstrap, String> {
    let context = Arc::new(SimContext::new());
    let address_space = Arc::new(SimAddressSpace::new());
    let gateway = Arc::new(Gateway::new(
        cfg.gateway.clone(),
        context.clone(),
        address_space.clone(),
    ));

    for entry in &cfg.mapping {
        let node: NodeId = entry
            .node
            .parse()
            .map_err(|e| format!("mapping '{}': {}", entry.pv, e))?;
        let (record, initial) = seed(entry).map_err(|e| format!("mapping '{}': {}", entry.pv, e))?;
        context.add_pv(entry.pv.clone(), record);
        address_space.add_variable(&node, initial);
        gateway
            .try_add_mapping(&entry.pv, node)
            .map_err(|e| format!("mapping '{}': {}", entry.pv, e))?;
        info!(pv = %entry.pv, node = %entry.node, kind = %entry.kind, "mapping registered");
    }

    address_space.set_interceptor(&gateway);
    Ok(Bootstrap {
        context,
        address_space,
        gateway,
    })
}

/// Initial remote record and local placeholder for `entry`.
///
/// Fails when `initial` cannot be represented by the entry's kind.
fn seed(entry: &MappingEntry) -> Result<(RemoteValue, Variant), String> {
    let v = entry.initial;
    Ok(match entry.kind {
        PvKind::Analog => (RemoteValue::scalar(Field::Float64(v)), Variant::Double(0.0)),
        PvKind::Binary => (
            RemoteValue::enumerated(
                choice_index(v, 2)?,
                vec!["Off".into(), "On".into()],
            ),
            Variant::Boolean(false),
        ),
        PvKind::MultiState => {
            let choices: Vec<String> = if entry.choices.is_empty() {
                (0..4).map(|i| format!("State{i}")).collect()
            } else {
                entry.choices.clone()
            };
            let index = choice_index(v, choices.len())?;
            (RemoteValue::enumerated(index, choices), Variant::Int16(0))
        }
        PvKind::Long => {
            let n = integral(v, i32::MIN as f64, i32::MAX as f64 + 1.0)?;
            // Range-checked just above.
            (RemoteValue::scalar(Field::Int32(n as i32)), Variant::Int32(0))
        }
        PvKind::Int64 => {
            let n = integral(v, i64::MIN as f64, i64::MAX as f64)?;
            (RemoteValue::scalar(Field::Int64(n)), Variant::Int64(0))
        }
    })
}

/// `v` as an integer in `[min, max)`.
fn integral(v: f64, min: f64, max: f64) -> Result<i64, String> {
    if v.fract() != 0.0 || v < min || v >= max {
        return Err(format!("initial value {v} is not an integer in [{min}, {max})"));
    }
    Ok(v as i64)
}

/// `v` as an index into `len` choices.
fn choice_index(v: f64, len: usize) -> Result<i32, String> {
    let index = integral(v, 0.0, len as f64)
        .map_err(|_| format!("initial index {v} is outside the {len} choice(s)"))?;
    // Bounded by `len`, which came from a Vec of labels.
    i32::try_from(index).map_err(|_| format!("initial index {v} is too large"))
}
