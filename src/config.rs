use crate::{
    AcquisitionMode, BoardConnection, BoardModel, BusTransport, ConnectionKind, LinkParams,
    ProtectedRanges, SignalLogic, TriggerEdge, ZeroSuppressionMode, ZleChannelSettings,
};
use confique::Config;
use serde::Deserialize;

#[derive(Config, Debug, Clone)]
pub struct Conf {
    #[config(nested)]
    pub link: LinkSettings,
    #[config(nested)]
    pub trigger: TriggerSettings,
    #[config(nested)]
    pub acquisition: AcquisitionSettings,
}

#[derive(Config, Debug, Clone)]
pub struct LinkSettings {
    /// Defaults to V1720.
    pub model: Option<BoardModel>,
    #[config(default = 0)]
    pub board_id: i32,
    /// Bus base address of the board.
    pub address: u32,
    /// Defaults to USB.
    pub connection: Option<ConnectionKind>,
    #[config(default = 0)]
    pub device_index: u32,
    #[config(default = 0)]
    pub link_number: u32,
    /// Registers the write guard refuses to touch.
    #[config(default = [])]
    pub protected_registers: Vec<u32>,
}

#[derive(Config, Debug, Clone)]
pub struct TriggerSettings {
    pub auto_trigger_mask: Option<u32>,
    pub external_trigger: Option<SignalLogic>,
    #[config(default = false)]
    pub sw_trigger: bool,
    #[config(default = [])]
    pub edges: Vec<ChannelEdge>,
    pub coincidence_level: Option<u32>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct ChannelEdge {
    pub channel: u32,
    pub edge: TriggerEdge,
}

#[derive(Config, Debug, Clone)]
pub struct AcquisitionSettings {
    /// Write the baseline register set before anything else.
    #[config(default = true)]
    pub initialize: bool,
    /// Left untouched when absent.
    pub mode: Option<AcquisitionMode>,
    pub zs_mode: Option<ZeroSuppressionMode>,
    #[config(default = [])]
    pub zle_channels: Vec<ZleChannelSettings>,
}

impl LinkSettings {
    pub fn link_params(&self) -> LinkParams {
        LinkParams {
            kind: self.connection.unwrap_or_default(),
            device_index: self.device_index,
            link_number: self.link_number,
        }
    }

    /// Builds a closed connection for the configured board.
    pub fn connection<T: BusTransport>(&self, transport: T) -> BoardConnection<T> {
        let board = BoardConnection::new(
            transport,
            self.model.unwrap_or_default(),
            self.board_id,
            self.address,
        )
        .with_link(self.link_params());
        if self.protected_registers.is_empty() {
            board
        } else {
            let policy = self
                .protected_registers
                .iter()
                .fold(ProtectedRanges::new(), |policy, &addr| {
                    policy.protect_register(addr)
                });
            board.with_write_policy(policy)
        }
    }
}
