use super::models::RoomEvent;

/// Which timeline events are allowed through to the relay.
#[derive(Debug, Clone, Copy)]
pub(super) struct EventFilter<'a> {
    pub(super) own_user_id: &'a str,
    pub(super) monitored_room: &'a str,
    /// Events with an earlier `origin_server_ts` are history replayed by the
    /// homeserver and are ignored.
    pub(super) started_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Classified<'e> {
    Message {
        sender: &'e str,
        body: &'e str,
        origin_server_ts: u64,
    },
    Reaction {
        sender: &'e str,
        relates_to: Option<&'e str>,
        key: Option<&'e str>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Skip {
    BeforeStart,
    OwnEvent,
    OtherRoom,
    UnhandledType,
    EmptyBody,
}

pub(super) fn classify<'e>(
    filter: &EventFilter<'_>,
    room_id: &str,
    event: &'e RoomEvent,
) -> Result<Classified<'e>, Skip> {
    if event.origin_server_ts < filter.started_at_ms {
        return Err(Skip::BeforeStart);
    }
    if event.sender == filter.own_user_id {
        return Err(Skip::OwnEvent);
    }
    if room_id != filter.monitored_room {
        return Err(Skip::OtherRoom);
    }

    match event.event_type.as_str() {
        "m.room.message" => {
            let body = event.content.body.as_deref().unwrap_or_default();
            if body.trim().is_empty() {
                return Err(Skip::EmptyBody);
            }
            Ok(Classified::Message {
                sender: &event.sender,
                body,
                origin_server_ts: event.origin_server_ts,
            })
        }
        "m.reaction" => {
            let relation = event.content.relates_to.as_ref();
            Ok(Classified::Reaction {
                sender: &event.sender,
                relates_to: relation.and_then(|r| r.event_id.as_deref()),
                key: relation.and_then(|r| r.key.as_deref()),
            })
        }
        _ => Err(Skip::UnhandledType),
    }
}

/// Membership change carried by an `m.room.member` event: the member's user id
/// and their current display name, `None` if they left or have none set.
pub(super) fn member_update(event: &RoomEvent) -> Option<(&str, Option<&str>)> {
    if event.event_type != "m.room.member" {
        return None;
    }
    let user_id = event.state_key.as_deref().filter(|k| !k.is_empty())?;
    let joined = event.content.membership.as_deref() == Some("join");
    let name = event
        .content
        .displayname
        .as_deref()
        .map(str::trim)
        .filter(|n| joined && !n.is_empty());
    Some((user_id, name))
}
