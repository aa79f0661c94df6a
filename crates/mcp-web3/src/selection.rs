//! The active network and its tool toggles.
//!
//! Actions that would break an invariant (selecting a network that is not available,
//! disabling a required tool) leave the state untouched and report why through an
//! outcome value instead of an error.

use crate::catalog::{Catalog, Network, NetworkStatus, Tool};
use eyre::ContextCompat as _;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Plain-data form of a selection, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub network: String,
    pub tools: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectIgnored {
    UnknownNetwork,
    NotAvailable(NetworkStatus),
}

impl fmt::Display for SelectIgnored {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNetwork => f.write_str("unknown network"),
            Self::NotAvailable(status) => write!(f, "network is {}", status.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Switched,
    Ignored(SelectIgnored),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleIgnored {
    UnknownTool,
    Required,
}

impl fmt::Display for ToggleIgnored {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTool => f.write_str("not a tool of the active network"),
            Self::Required => f.write_str("required tools cannot be disabled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The tool's state flipped; `enabled` is the new state.
    Toggled { enabled: bool },
    /// Already in the requested state.
    Unchanged { enabled: bool },
    Ignored(ToggleIgnored),
}

fn seed(network: &Network) -> BTreeMap<String, bool> {
    network
        .tools
        .iter()
        .map(|t| (t.id.clone(), t.required))
        .collect()
}

#[derive(Debug, Clone)]
pub struct SelectionStore<'c> {
    catalog: &'c Catalog,
    network: &'c Network,
    tools: BTreeMap<String, bool>,
}

impl<'c> SelectionStore<'c> {
    /// Fresh selection on the default network with only required tools enabled.
    pub fn new(catalog: &'c Catalog, preferred_network: Option<&str>) -> eyre::Result<Self> {
        let network = catalog
            .default_network(preferred_network)
            .context("catalog has no available network")?;
        Ok(Self {
            catalog,
            network,
            tools: seed(network),
        })
    }

    /// Rebuild a store from a persisted selection, reconciling it with `catalog`.
    ///
    /// A network that is unknown or no longer available falls back to the default network.
    /// Unknown tool ids are dropped and required tools are forced on.
    pub fn restore(
        catalog: &'c Catalog,
        snapshot: &Selection,
        preferred_network: Option<&str>,
    ) -> eyre::Result<Self> {
        let restored = catalog
            .network(&snapshot.network)
            .filter(|n| n.status.is_selectable());
        let Some(network) = restored else {
            tracing::warn!(
                network = %snapshot.network,
                "saved network is not selectable; starting from the default"
            );
            return Self::new(catalog, preferred_network);
        };

        let tools = network
            .tools
            .iter()
            .map(|t| {
                let saved = snapshot.tools.get(&t.id).copied().unwrap_or(false);
                (t.id.clone(), t.required || saved)
            })
            .collect();
        Ok(Self {
            catalog,
            network,
            tools,
        })
    }

    pub const fn active_network(&self) -> &'c Network {
        self.network
    }

    /// Make `network_id` the active network, re-seeding its tools.
    pub fn select_network(&mut self, network_id: &str) -> SelectOutcome {
        let Some(network) = self.catalog.network(network_id) else {
            tracing::debug!(network = network_id, "ignoring select of unknown network");
            return SelectOutcome::Ignored(SelectIgnored::UnknownNetwork);
        };
        if !network.status.is_selectable() {
            tracing::debug!(
                network = network_id,
                status = network.status.as_str(),
                "ignoring select of unavailable network"
            );
            return SelectOutcome::Ignored(SelectIgnored::NotAvailable(network.status));
        }
        self.network = network;
        self.tools = seed(network);
        tracing::info!(network = network_id, "selected network");
        SelectOutcome::Switched
    }

    /// Re-seed the active network.
    pub fn reset(&mut self) {
        self.tools = seed(self.network);
    }

    pub fn toggle_tool(&mut self, tool_id: &str) -> ToggleOutcome {
        let Some(tool) = self.network.tool(tool_id) else {
            tracing::debug!(
                network = %self.network.id,
                tool = tool_id,
                "ignoring toggle of unknown tool"
            );
            return ToggleOutcome::Ignored(ToggleIgnored::UnknownTool);
        };
        if tool.required {
            tracing::debug!(tool = tool_id, "ignoring toggle of required tool");
            return ToggleOutcome::Ignored(ToggleIgnored::Required);
        }
        let entry = self.tools.entry(tool.id.clone()).or_insert(false);
        *entry = !*entry;
        let enabled = *entry;
        tracing::info!(network = %self.network.id, tool = tool_id, enabled, "toggled tool");
        ToggleOutcome::Toggled { enabled }
    }

    /// Toggle `tool_id` only if its state differs from `enabled`.
    pub fn set_tool_enabled(&mut self, tool_id: &str, enabled: bool) -> ToggleOutcome {
        match self.network.tool(tool_id) {
            Some(_) if self.is_enabled(tool_id) == enabled => ToggleOutcome::Unchanged { enabled },
            _ => self.toggle_tool(tool_id),
        }
    }

    pub fn is_enabled(&self, tool_id: &str) -> bool {
        self.tools.get(tool_id).copied().unwrap_or(false)
    }

    /// Enabled tools of the active network, in catalog order.
    pub fn enabled_tools(&self) -> Vec<&'c Tool> {
        self.network
            .tools
            .iter()
            .filter(|t| self.is_enabled(&t.id))
            .collect()
    }

    pub fn enabled_tool_ids(&self) -> Vec<&'c str> {
        self.enabled_tools()
            .into_iter()
            .map(|t| t.id.as_str())
            .collect()
    }

    pub fn snapshot(&self) -> Selection {
        Selection {
            network: self.network.id.clone(),
            tools: self.tools.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ChainType;
    use proptest::prelude::*;

    fn tool(id: &str, required: bool) -> Tool {
        Tool {
            id: id.to_owned(),
            name: id.to_owned(),
            description: String::new(),
            required,
            parameters: BTreeMap::new(),
            usage_count: 0,
        }
    }

    fn network(id: &str, status: NetworkStatus, tools: Vec<Tool>) -> Network {
        Network {
            id: id.to_owned(),
            name: id.to_owned(),
            chain_type: ChainType::Evm,
            status,
            tools,
        }
    }

    fn catalog() -> eyre::Result<Catalog> {
        Ok(Catalog::new(vec![
            network(
                "alpha",
                NetworkStatus::Available,
                vec![tool("read", true), tool("send", false), tool("swap", false)],
            ),
            network(
                "bravo",
                NetworkStatus::Available,
                vec![tool("read", true), tool("mint", false)],
            ),
            network(
                "charlie",
                NetworkStatus::Beta,
                vec![tool("read", true), tool("bridge", false)],
            ),
            network(
                "delta",
                NetworkStatus::ComingSoon,
                vec![tool("read", true)],
            ),
        ])?)
    }

    #[test]
    fn starts_on_default_network_with_required_tools() -> eyre::Result<()> {
        let c = catalog()?;
        let s = SelectionStore::new(&c, None)?;
        assert_eq!(s.active_network().id, "alpha");
        assert_eq!(s.enabled_tool_ids(), vec!["read"]);

        let s = SelectionStore::new(&c, Some("bravo"))?;
        assert_eq!(s.active_network().id, "bravo");
        Ok(())
    }

    #[test]
    fn selecting_non_available_network_is_a_no_op() -> eyre::Result<()> {
        let c = catalog()?;
        let mut s = SelectionStore::new(&c, None)?;
        s.toggle_tool("send");
        let before = s.snapshot();

        for (id, expected) in [
            ("charlie", SelectIgnored::NotAvailable(NetworkStatus::Beta)),
            ("delta", SelectIgnored::NotAvailable(NetworkStatus::ComingSoon)),
            ("zulu", SelectIgnored::UnknownNetwork),
        ] {
            assert_eq!(s.select_network(id), SelectOutcome::Ignored(expected));
            assert_eq!(s.snapshot(), before, "select {id} changed state");
        }
        Ok(())
    }

    #[test]
    fn selecting_network_enables_exactly_required_tools() -> eyre::Result<()> {
        let c = catalog()?;
        let mut s = SelectionStore::new(&c, None)?;
        s.toggle_tool("send");
        s.toggle_tool("swap");

        assert_eq!(s.select_network("bravo"), SelectOutcome::Switched);
        assert_eq!(s.enabled_tool_ids(), vec!["read"]);
        assert!(!s.is_enabled("send"));

        // Re-selecting the active network also resets it.
        s.toggle_tool("mint");
        assert_eq!(s.select_network("bravo"), SelectOutcome::Switched);
        assert_eq!(s.enabled_tool_ids(), vec!["read"]);
        Ok(())
    }

    #[test]
    fn required_tools_cannot_be_toggled() -> eyre::Result<()> {
        let c = catalog()?;
        let mut s = SelectionStore::new(&c, None)?;
        for _ in 0..3 {
            assert_eq!(
                s.toggle_tool("read"),
                ToggleOutcome::Ignored(ToggleIgnored::Required)
            );
            assert!(s.is_enabled("read"));
        }
        assert_eq!(
            s.set_tool_enabled("read", false),
            ToggleOutcome::Ignored(ToggleIgnored::Required)
        );
        assert!(s.is_enabled("read"));
        Ok(())
    }

    #[test]
    fn toggle_flips_only_the_named_tool_of_the_active_network() -> eyre::Result<()> {
        let c = catalog()?;
        let mut s = SelectionStore::new(&c, None)?;
        assert_eq!(s.toggle_tool("swap"), ToggleOutcome::Toggled { enabled: true });
        assert_eq!(s.enabled_tool_ids(), vec!["read", "swap"]);
        assert_eq!(s.toggle_tool("swap"), ToggleOutcome::Toggled { enabled: false });
        assert_eq!(s.enabled_tool_ids(), vec!["read"]);

        // `mint` only exists on bravo.
        assert_eq!(
            s.toggle_tool("mint"),
            ToggleOutcome::Ignored(ToggleIgnored::UnknownTool)
        );
        assert_eq!(s.enabled_tool_ids(), vec!["read"]);
        Ok(())
    }

    #[test]
    fn enabled_tools_follow_catalog_order() -> eyre::Result<()> {
        let c = catalog()?;
        let mut s = SelectionStore::new(&c, None)?;
        s.toggle_tool("swap");
        s.toggle_tool("send");
        let names: Vec<&str> = s.enabled_tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["read", "send", "swap"]);
        Ok(())
    }

    #[test]
    fn set_tool_enabled_is_idempotent() -> eyre::Result<()> {
        let c = catalog()?;
        let mut s = SelectionStore::new(&c, None)?;
        assert_eq!(
            s.set_tool_enabled("send", true),
            ToggleOutcome::Toggled { enabled: true }
        );
        assert_eq!(
            s.set_tool_enabled("send", true),
            ToggleOutcome::Unchanged { enabled: true }
        );
        assert_eq!(
            s.set_tool_enabled("send", false),
            ToggleOutcome::Toggled { enabled: false }
        );
        assert_eq!(
            s.set_tool_enabled("nope", true),
            ToggleOutcome::Ignored(ToggleIgnored::UnknownTool)
        );
        Ok(())
    }

    #[test]
    fn reset_reseeds_active_network() -> eyre::Result<()> {
        let c = catalog()?;
        let mut s = SelectionStore::new(&c, Some("alpha"))?;
        s.toggle_tool("send");
        s.reset();
        assert_eq!(s.active_network().id, "alpha");
        assert_eq!(s.enabled_tool_ids(), vec!["read"]);
        Ok(())
    }

    #[test]
    fn restore_reconciles_with_catalog() -> eyre::Result<()> {
        let c = catalog()?;
        let snap = Selection {
            network: "alpha".to_owned(),
            tools: BTreeMap::from([
                ("read".to_owned(), false),
                ("swap".to_owned(), true),
                ("gone".to_owned(), true),
            ]),
        };
        let s = SelectionStore::restore(&c, &snap, None)?;
        assert_eq!(s.enabled_tool_ids(), vec!["read", "swap"]);
        assert!(!s.snapshot().tools.contains_key("gone"));
        Ok(())
    }

    #[test]
    fn restore_falls_back_when_network_is_not_selectable() -> eyre::Result<()> {
        let c = catalog()?;
        for id in ["charlie", "removed"] {
            let snap = Selection {
                network: id.to_owned(),
                tools: BTreeMap::from([("bridge".to_owned(), true)]),
            };
            let s = SelectionStore::restore(&c, &snap, Some("bravo"))?;
            assert_eq!(s.active_network().id, "bravo");
            assert_eq!(s.enabled_tool_ids(), vec!["read"]);
        }
        Ok(())
    }

    fn arb_status() -> impl Strategy<Value = NetworkStatus> {
        prop_oneof![
            Just(NetworkStatus::Available),
            Just(NetworkStatus::Beta),
            Just(NetworkStatus::ComingSoon),
        ]
    }

    /// Catalogs `n0..n4`, each with tools `t0..t5` and random required flags.
    fn arb_catalog() -> impl Strategy<Value = Catalog> {
        prop::collection::vec(
            (arb_status(), prop::collection::vec(any::<bool>(), 0..6)),
            1..5,
        )
        .prop_filter_map("catalog must validate", |specs| {
            let mut networks: Vec<Network> = specs
                .into_iter()
                .enumerate()
                .map(|(i, (status, required))| {
                    let tools = required
                        .into_iter()
                        .enumerate()
                        .map(|(j, r)| tool(&format!("t{j}"), r))
                        .collect();
                    network(&format!("n{i}"), status, tools)
                })
                .collect();
            if !networks.iter().any(|n| n.status.is_selectable()) {
                if let Some(last) = networks.last_mut() {
                    last.status = NetworkStatus::Available;
                }
            }
            Catalog::new(networks).ok()
        })
    }

    fn fail(e: &eyre::Report) -> TestCaseError {
        TestCaseError::fail(format!("{e:#}"))
    }

    proptest! {
        #[test]
        fn invariants_hold_across_any_action_sequence(
            c in arb_catalog(),
            actions in prop::collection::vec((any::<bool>(), 0_usize..6, 0_usize..7), 0..24),
        ) {
            let mut s = SelectionStore::new(&c, None).map_err(|e| fail(&e))?;
            for (is_select, ni, ti) in actions {
                let before = s.snapshot();
                if is_select {
                    let id = format!("n{ni}");
                    let target = c.network(&id);
                    let outcome = s.select_network(&id);
                    match target {
                        Some(n) if n.status.is_selectable() => {
                            prop_assert_eq!(outcome, SelectOutcome::Switched);
                            prop_assert_eq!(&s.active_network().id, &n.id);
                            let required: Vec<&str> =
                                n.required_tools().map(|t| t.id.as_str()).collect();
                            prop_assert_eq!(s.enabled_tool_ids(), required);
                        }
                        _ => {
                            prop_assert!(matches!(outcome, SelectOutcome::Ignored(_)));
                            prop_assert_eq!(s.snapshot(), before);
                        }
                    }
                } else {
                    let id = format!("t{ti}");
                    let target = s.active_network().tool(&id);
                    let was = s.is_enabled(&id);
                    let outcome = s.toggle_tool(&id);
                    match target {
                        Some(t) if !t.required => {
                            prop_assert_eq!(outcome, ToggleOutcome::Toggled { enabled: !was });
                            let after = s.snapshot();
                            for (k, v) in &after.tools {
                                if *k != id {
                                    prop_assert_eq!(before.tools.get(k), Some(v));
                                }
                            }
                        }
                        _ => {
                            prop_assert!(matches!(outcome, ToggleOutcome::Ignored(_)));
                            prop_assert_eq!(s.snapshot(), before);
                        }
                    }
                }
                for t in s.active_network().required_tools() {
                    prop_assert!(s.is_enabled(&t.id), "required {} is off", t.id);
                }
            }
        }

        #[test]
        fn restore_always_yields_a_selectable_network_with_required_tools(
            c in arb_catalog(),
            ni in 0_usize..6,
            saved in prop::collection::btree_map("t[0-7]", any::<bool>(), 0..8),
        ) {
            let snap = Selection { network: format!("n{ni}"), tools: saved };
            let s = SelectionStore::restore(&c, &snap, None).map_err(|e| fail(&e))?;
            let n = s.active_network();
            prop_assert!(n.status.is_selectable());
            let kept = n.id == snap.network;
            for t in &n.tools {
                let saved_on = kept && snap.tools.get(&t.id).copied().unwrap_or(false);
                prop_assert_eq!(s.is_enabled(&t.id), t.required || saved_on);
            }
        }
    }
}
