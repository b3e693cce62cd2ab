//! Membership rules for the private admin channels inside a dispute.
//!
//! A dispute can carry up to three logical channels over one message table:
//! the public thread plus one private channel per counterpart (admin↔seller,
//! admin↔buyer). Channel membership accreted across several schema changes
//! (type tags, self-addressed recipient markers, untagged legacy rows), so the
//! rule is kept as an explicit OR of named predicates, each tested on its own.

use crate::message::{
    Message, MSG_TYPE_ADMIN_TO_BUYER, MSG_TYPE_ADMIN_TO_SELLER, MSG_TYPE_BUYER_TO_ADMIN,
    MSG_TYPE_SELLER_TO_ADMIN,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelRole {
    Seller,
    Buyer,
}

impl ChannelRole {
    /// Tag on messages the admin sends into this counterpart's channel.
    pub fn admin_to_role_tag(self) -> &'static str {
        match self {
            ChannelRole::Seller => MSG_TYPE_ADMIN_TO_SELLER,
            ChannelRole::Buyer => MSG_TYPE_ADMIN_TO_BUYER,
        }
    }

    /// Tag on messages this counterpart sends to the admin.
    pub fn role_to_admin_tag(self) -> &'static str {
        match self {
            ChannelRole::Seller => MSG_TYPE_SELLER_TO_ADMIN,
            ChannelRole::Buyer => MSG_TYPE_BUYER_TO_ADMIN,
        }
    }
}

/// Identifies one private admin channel: the counterpart it belongs to and
/// who is currently looking at it (the admin or the counterpart themselves).
#[derive(Clone, Debug)]
pub struct ChannelView {
    pub counterpart_role: ChannelRole,
    pub counterpart_id: String,
    pub viewer_id: String,
}

pub fn typed_admin_to_role(message: &Message, view: &ChannelView) -> bool {
    message.message_type.as_deref() == Some(view.counterpart_role.admin_to_role_tag())
}

pub fn typed_role_to_admin(message: &Message, view: &ChannelView) -> bool {
    message.sender_id == view.counterpart_id
        && message.message_type.as_deref() == Some(view.counterpart_role.role_to_admin_tag())
}

/// Counterpart message addressed to the counterpart's own id. Used before the
/// type tags existed to keep a message out of the public thread.
pub fn self_addressed_by_counterpart(message: &Message, view: &ChannelView) -> bool {
    message.sender_id == view.counterpart_id
        && message.recipient_id.as_deref() == Some(view.counterpart_id.as_str())
}

pub fn addressed_to_viewer(message: &Message, view: &ChannelView) -> bool {
    message.sender_id == view.counterpart_id
        && message.recipient_id.as_deref() == Some(view.viewer_id.as_str())
}

/// Counterpart message with no recipient marker at all, predating markers.
pub fn legacy_untagged_by_counterpart(message: &Message, view: &ChannelView) -> bool {
    message.sender_id == view.counterpart_id
        && message.recipient_id.is_none()
        && message.message_type.is_none()
}

/// Synthetic conversation id under which a private admin channel keeps its
/// read cursor, distinct from the public dispute thread's cursor.
pub fn channel_conversation_id(dispute_conversation_id: &str, role: ChannelRole) -> String {
    match role {
        ChannelRole::Seller => format!("{dispute_conversation_id}::admin_seller"),
        ChannelRole::Buyer => format!("{dispute_conversation_id}::admin_buyer"),
    }
}

/// A message belongs to the channel if ANY predicate matches. The predicates
/// are unioned, never intersected.
pub fn is_visible_to_channel(message: &Message, view: &ChannelView) -> bool {
    typed_admin_to_role(message, view)
        || typed_role_to_admin(message, view)
        || self_addressed_by_counterpart(message, view)
        || addressed_to_viewer(message, view)
        || legacy_untagged_by_counterpart(message, view)
}
