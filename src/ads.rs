use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use rand::Rng;

use crate::conversation::AdPlacement;

pub const AD_UNIT_PATH: &str = "/21812513503/domus.buzz/domus_bloco_01";
pub const AD_SIZES: [[u32; 2]; 4] = [[250, 250], [300, 250], [250, 300], [336, 280]];

// One concrete slot on the page, keyed by a DOM id that stays stable for the
// lifetime of the placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDefinition {
    pub div_id: String,
    pub ad_unit_path: &'static str,
    pub sizes: &'static [[u32; 2]],
}

impl SlotDefinition {
    fn for_index(index: u32) -> Self {
        let suffix: u32 = rand::thread_rng().gen();
        Self {
            div_id: format!("div-gpt-ad-1768928325283-{}-{:08x}", index, suffix),
            ad_unit_path: AD_UNIT_PATH,
            sizes: &AD_SIZES,
        }
    }
}

// The ad-network capability. Injected so the renderer can run against a fake
// in tests and a no-op logger in environments without the real SDK.
pub trait AdNetwork: Send + Sync {
    fn define_slot(&self, slot: &SlotDefinition) -> bool;
    fn display(&self, div_id: &str) -> bool;
    fn destroy(&self, div_id: &str) -> bool;
}

// Server-side stand-in for the page SDK: slot bookkeeping happens here, the
// actual painting is done client-side from the slot metadata we hand out.
pub struct LogAdNetwork;

impl AdNetwork for LogAdNetwork {
    fn define_slot(&self, slot: &SlotDefinition) -> bool {
        debug!("defining ad slot {} at {}", slot.div_id, slot.ad_unit_path);
        true
    }

    fn display(&self, div_id: &str) -> bool {
        debug!("displaying ad slot {}", div_id);
        true
    }

    fn destroy(&self, div_id: &str) -> bool {
        debug!("destroying ad slot {}", div_id);
        true
    }
}

// Keeps exactly one live slot per placement index. Display is best-effort:
// network refusals are swallowed and never retried.
pub struct AdSlotRenderer {
    network: Arc<dyn AdNetwork>,
    live: BTreeMap<u32, SlotDefinition>,
}

impl AdSlotRenderer {
    pub fn new(network: Arc<dyn AdNetwork>) -> Self {
        Self {
            network,
            live: BTreeMap::new(),
        }
    }

    pub fn ensure_slot(&mut self, index: u32) {
        if self.live.contains_key(&index) {
            return;
        }
        let slot = SlotDefinition::for_index(index);
        if self.network.define_slot(&slot) {
            self.network.display(&slot.div_id);
        }
        self.live.insert(index, slot);
    }

    pub fn sync<'a>(&mut self, placements: impl IntoIterator<Item = &'a AdPlacement>) {
        for placement in placements {
            self.ensure_slot(placement.position_index);
        }
    }

    pub fn slot_for(&self, index: u32) -> Option<&SlotDefinition> {
        self.live.get(&index)
    }

    pub fn live_slots(&self) -> usize {
        self.live.len()
    }

    pub fn teardown(&mut self) {
        for (_, slot) in std::mem::take(&mut self.live) {
            self.network.destroy(&slot.div_id);
        }
    }
}

impl Drop for AdSlotRenderer {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingAdNetwork {
        events: Mutex<Vec<String>>,
        refuse_define: bool,
    }

    impl RecordingAdNetwork {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                refuse_define: false,
            })
        }

        fn refusing() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                refuse_define: true,
            })
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().expect("events lock").clone()
        }

        fn record(&self, event: String) {
            self.events.lock().expect("events lock").push(event);
        }
    }

    impl AdNetwork for RecordingAdNetwork {
        fn define_slot(&self, slot: &SlotDefinition) -> bool {
            self.record(format!("define:{}", slot.div_id));
            !self.refuse_define
        }

        fn display(&self, div_id: &str) -> bool {
            self.record(format!("display:{}", div_id));
            true
        }

        fn destroy(&self, div_id: &str) -> bool {
            self.record(format!("destroy:{}", div_id));
            true
        }
    }

    #[test]
    fn defines_and_displays_one_slot_per_index() {
        let network = RecordingAdNetwork::new();
        let mut renderer = AdSlotRenderer::new(network.clone());

        let placements = [AdPlacement::new(1), AdPlacement::new(2)];
        renderer.sync(placements.iter());

        assert_eq!(renderer.live_slots(), 2);
        let events = network.events();
        assert_eq!(events.len(), 4);
        assert!(events[0].starts_with("define:"));
        assert!(events[1].starts_with("display:"));
        assert_ne!(renderer.slot_for(1), renderer.slot_for(2));
    }

    #[test]
    fn repeated_sync_is_idempotent() {
        let network = RecordingAdNetwork::new();
        let mut renderer = AdSlotRenderer::new(network.clone());

        let placements = [AdPlacement::new(1)];
        renderer.sync(placements.iter());
        let first = renderer.slot_for(1).cloned().expect("slot");
        renderer.sync(placements.iter());

        assert_eq!(network.events().len(), 2);
        assert_eq!(renderer.slot_for(1), Some(&first));
    }

    #[test]
    fn teardown_destroys_every_live_slot() {
        let network = RecordingAdNetwork::new();
        let mut renderer = AdSlotRenderer::new(network.clone());
        renderer.ensure_slot(1);
        renderer.ensure_slot(2);

        renderer.teardown();
        assert_eq!(renderer.live_slots(), 0);

        let destroys: Vec<String> = network
            .events()
            .into_iter()
            .filter(|event| event.starts_with("destroy:"))
            .collect();
        assert_eq!(destroys.len(), 2);

        // A second teardown has nothing left to destroy.
        renderer.teardown();
        assert_eq!(
            network
                .events()
                .iter()
                .filter(|event| event.starts_with("destroy:"))
                .count(),
            2
        );
    }

    #[test]
    fn drop_tears_down_outstanding_slots() {
        let network = RecordingAdNetwork::new();
        {
            let mut renderer = AdSlotRenderer::new(network.clone());
            renderer.ensure_slot(1);
        }
        assert!(network
            .events()
            .iter()
            .any(|event| event.starts_with("destroy:")));
    }

    #[test]
    fn define_refusal_is_swallowed_without_display_or_retry() {
        let network = RecordingAdNetwork::refusing();
        let mut renderer = AdSlotRenderer::new(network.clone());
        renderer.ensure_slot(1);
        renderer.ensure_slot(1);

        let events = network.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].starts_with("define:"));
        // The slot metadata is still handed out for best-effort display.
        assert!(renderer.slot_for(1).is_some());
    }
}
