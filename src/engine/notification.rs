use crate::entities::creature::CreatureId;
use crate::world::position::{Direction, Position};
use crate::world::state::World;
use crate::world::viewport::{Viewport, ViewportSize};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

pub const TEXT_COLOR_RED: u8 = 180;
pub const TEXT_COLOR_LIGHT_GREEN: u8 = 30;
pub const TEXT_COLOR_LIGHT_GREY: u8 = 129;
pub const TEXT_COLOR_ORANGE: u8 = 198;
pub const TEXT_COLOR_PURPLE: u8 = 154;
pub const TEXT_COLOR_BLUE: u8 = 89;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicEffect {
    DrawBlood,
    Puff,
    Poison,
    BoneHit,
    HitByFire,
    EnergyHit,
    BlueShimmer,
}

impl MagicEffect {
    pub fn id(self) -> u8 {
        match self {
            MagicEffect::DrawBlood => 1,
            MagicEffect::Puff => 3,
            MagicEffect::EnergyHit => 12,
            MagicEffect::BlueShimmer => 13,
            MagicEffect::HitByFire => 16,
            MagicEffect::Poison => 17,
            MagicEffect::BoneHit => 18,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationPayload {
    CreatureMoved {
        creature: CreatureId,
        from: Position,
        to: Position,
    },
    CreatureTurned {
        creature: CreatureId,
        direction: Direction,
    },
    CreatureHealth {
        creature: CreatureId,
        health_percent: u8,
    },
    CreatureRemoved {
        creature: CreatureId,
    },
    MagicEffect(MagicEffect),
    AnimatedText {
        color: u8,
        text: String,
    },
    TileUpdated,
    StatusFlags {
        creature: CreatureId,
        flags: u8,
    },
    TextMessage(String),
}

/// Who should receive a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    /// Every creature whose viewport contains the location.
    Spectators,
    Only(CreatureId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub location: Option<Position>,
    pub recipients: Recipients,
    pub payload: NotificationPayload,
}

impl Notification {
    pub fn spectators(location: Position, payload: NotificationPayload) -> Self {
        Self {
            location: Some(location),
            recipients: Recipients::Spectators,
            payload,
        }
    }

    pub fn to_creature(creature: CreatureId, payload: NotificationPayload) -> Self {
        Self {
            location: None,
            recipients: Recipients::Only(creature),
            payload,
        }
    }

    /// Resolves recipients against the world as it is now.
    pub fn resolve(&self, world: &World) -> Vec<CreatureId> {
        match self.recipients {
            Recipients::Only(id) => {
                if world.creature_exists(id) {
                    vec![id]
                } else {
                    Vec::new()
                }
            }
            Recipients::Spectators => {
                let Some(location) = self.location else {
                    return Vec::new();
                };
                world
                    .creatures()
                    .filter(|creature| {
                        Viewport::from_center(creature.position, ViewportSize::default())
                            .contains(location)
                    })
                    .map(|creature| creature.id)
                    .collect()
            }
        }
    }
}

/// Fire-and-forget hand-off of notifications for delivery.
pub trait NotificationSink: Send {
    fn dispatch(&self, notification: Notification);
}

/// Hands notifications to a delivery worker over a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn dispatch(&self, notification: Notification) {
        // a gone receiver just means nobody is listening any more
        let _ = self.sender.send(notification);
    }
}

/// Keeps everything dispatched; handy for inspecting what an event emitted.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Notification> {
        match self.notifications.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => Vec::new(),
        }
    }
}

impl NotificationSink for RecordingSink {
    fn dispatch(&self, notification: Notification) {
        if let Ok(mut guard) = self.notifications.lock() {
            guard.push(notification);
        }
    }
}
