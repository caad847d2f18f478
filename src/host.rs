//! Plugin-host boundary: the UI descriptors this crate offers and a table of live UIs
//! addressed by opaque handles.

use crate::bridge::{ExternalUi, IdleStatus, UiHost};
use crate::config::BridgeConfig;
use crate::error::SpawnError;
use crate::log_debug;
use crate::process::SpawnRequest;
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::path::Path;
use std::sync::OnceLock;

pub const IDLE_INTERFACE_URI: &str = "http://lv2plug.in/ns/extensions/ui#idleInterface";
pub const SHOW_INTERFACE_URI: &str = "http://lv2plug.in/ns/extensions/ui#showInterface";

/// A UI type: its URI and the companion executable inside the plugin bundle.
#[derive(Debug, PartialEq, Eq)]
pub struct UiDescriptor {
    pub uri: &'static str,
    pub companion: &'static str,
}

static DESCRIPTORS: OnceLock<Vec<UiDescriptor>> = OnceLock::new();

pub fn descriptors() -> &'static [UiDescriptor] {
    DESCRIPTORS.get_or_init(|| {
        vec![UiDescriptor {
            uri: "http://portalmod.com/ns/modgui#X11UI",
            companion: "modgui-x11",
        }]
    })
}

pub fn descriptor(index: u32) -> Option<&'static UiDescriptor> {
    descriptors().get(usize::try_from(index).ok()?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Idle,
    Show,
}

pub fn extension_data(uri: &str) -> Option<Extension> {
    match uri {
        IDLE_INTERFACE_URI => Some(Extension::Idle),
        SHOW_INTERFACE_URI => Some(Extension::Show),
        _ => None,
    }
}

/// Opaque token handed to the host instead of a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UiHandle(NonZeroU64);

impl UiHandle {
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InstantiateError {
    #[error("host did not provide a parent window")]
    MissingParentWindow,
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

pub struct InstantiateRequest<'a> {
    pub plugin_uri: &'a str,
    pub bundle_path: &'a Path,
    pub parent_window: usize,
}

/// Live UIs of one descriptor. Removing an entry stops its companion.
pub struct HandleTable<H: UiHost> {
    descriptor: &'static UiDescriptor,
    config: BridgeConfig,
    next_id: u64,
    uis: HashMap<UiHandle, ExternalUi<H>>,
}

impl<H: UiHost> HandleTable<H> {
    pub fn new(descriptor: &'static UiDescriptor, config: BridgeConfig) -> Self {
        Self {
            descriptor,
            config,
            next_id: 0,
            uis: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.uis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uis.is_empty()
    }

    pub fn get(&self, handle: UiHandle) -> Option<&ExternalUi<H>> {
        self.uis.get(&handle)
    }

    /// Start the companion embedded in `parent_window`. The UI starts hidden and the host
    /// is asked for a 1x1 size until the companion reports its own.
    pub fn instantiate(
        &mut self,
        request: &InstantiateRequest<'_>,
        mut host: H,
    ) -> Result<UiHandle, InstantiateError> {
        if request.parent_window == 0 {
            return Err(InstantiateError::MissingParentWindow);
        }
        host.size_changed(1, 1);

        let spawn = SpawnRequest::new(
            request.bundle_path.join(self.descriptor.companion),
            vec![
                request.plugin_uri.to_string(),
                request.parent_window.to_string(),
            ],
        )
        .with_transport(self.config.transport);
        let config = BridgeConfig {
            show_on_start: false,
            ..self.config.clone()
        };
        let ui = ExternalUi::launch(&config, &spawn, host)?;

        self.next_id += 1;
        let handle = UiHandle(NonZeroU64::MIN.saturating_add(self.next_id - 1));
        self.uis.insert(handle, ui);
        Ok(handle)
    }

    /// Forward a port change; returns whether a control message was sent.
    pub fn port_event(&self, handle: UiHandle, index: u32, format: u32, buffer: &[u8]) -> bool {
        let Some(ui) = self.uis.get(&handle) else {
            return false;
        };
        match ui.port_event(index, format, buffer) {
            Ok(sent) => sent,
            Err(err) => {
                log_debug(&format!("port event {index} not delivered: {err}"));
                false
            }
        }
    }

    /// 0 keeps the UI; 1 asks the host to close it. Unknown handles ask to close.
    pub fn idle(&mut self, handle: UiHandle) -> i32 {
        self.uis
            .get_mut(&handle)
            .map_or(IdleStatus::TearDown, ExternalUi::idle)
            .as_host_code()
    }

    pub fn show(&self, handle: UiHandle) -> i32 {
        self.status_code(handle, ExternalUi::show)
    }

    pub fn hide(&self, handle: UiHandle) -> i32 {
        self.status_code(handle, ExternalUi::hide)
    }

    /// Stop and forget a UI. Returns false for an unknown (or already cleaned) handle.
    pub fn cleanup(&mut self, handle: UiHandle) -> bool {
        self.uis.remove(&handle).is_some()
    }

    fn status_code(
        &self,
        handle: UiHandle,
        send: impl FnOnce(&ExternalUi<H>) -> Result<(), crate::error::ChannelError>,
    ) -> i32 {
        match self.uis.get(&handle).map(send) {
            Some(Ok(())) => 0,
            Some(Err(err)) => {
                log_debug(&format!("ui {}: {err}", handle.get()));
                1
            }
            None => 1,
        }
    }
}
