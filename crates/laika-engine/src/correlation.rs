// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Links harvested person records to internal users.

use chrono::{DateTime, Utc};
use laika_core::{
    DiscoveryState, DomainEvent, EventKind, LaikaError, LaikaObject, MatchSubject, ObjectType,
    Role, User, UserPreferences, fields, new_id,
};
use laika_storage::queries::{objects, users};
use rusqlite::Connection;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::bus::{EventContext, EventSubscriber};

fn normalized(value: Option<&str>) -> String {
    value.unwrap_or_default().trim().to_lowercase()
}

/// The one candidate whose e-mail equals `email`, when there is exactly one.
fn email_tie_break<'a, T>(
    candidates: &'a [T],
    email: &str,
    email_of: impl Fn(&T) -> String,
) -> Option<&'a T> {
    if email.is_empty() {
        return None;
    }
    let mut exact = candidates.iter().filter(|c| email_of(c) == email);
    match (exact.next(), exact.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

fn link(
    conn: &Connection,
    object: &LaikaObject,
    user: &User,
    now: DateTime<Utc>,
) -> Result<DomainEvent, LaikaError> {
    objects::set_field(
        conn,
        &object.id,
        fields::LINK_TO_PEOPLE_TABLE,
        Value::String(user.id.clone()),
        now,
    )?;
    info!(object = %object.id, user = %user.id, "background check linked");
    Ok(DomainEvent::BackgroundCheckSingleMatch {
        organization_id: object.organization_id.clone(),
        user_id: user.id.clone(),
        object_id: object.id.clone(),
    })
}

/// Match a new background check against the organization's users.
pub fn correlate_object(
    conn: &Connection,
    object: &LaikaObject,
    now: DateTime<Utc>,
) -> Result<Option<DomainEvent>, LaikaError> {
    if object.object_type != ObjectType::BackgroundCheck || object.is_linked_to_person() {
        return Ok(None);
    }
    let email = normalized(object.field_str(fields::EMAIL));
    let candidates = users::find_by_name_or_email(
        conn,
        &object.organization_id,
        object.field_str(fields::FIRST_NAME).unwrap_or_default(),
        object.field_str(fields::LAST_NAME).unwrap_or_default(),
        &email,
    )?;

    match candidates.as_slice() {
        [] => Ok(None),
        [only] => link(conn, object, only, now).map(Some),
        many => {
            if let Some(user) = email_tie_break(many, &email, |u| normalized(Some(&u.email))) {
                return link(conn, object, user, now).map(Some);
            }
            debug!(object = %object.id, candidates = many.len(), "background check is ambiguous");
            Ok(Some(DomainEvent::BackgroundCheckMultipleMatch {
                organization_id: object.organization_id.clone(),
                subject: MatchSubject::Object(object.id.clone()),
                candidates: many.iter().map(|u| u.id.clone()).collect(),
            }))
        }
    }
}

/// Match a newly invited user against unlinked background checks.
pub fn correlate_user(
    conn: &Connection,
    user: &User,
    now: DateTime<Utc>,
) -> Result<Option<DomainEvent>, LaikaError> {
    let email = normalized(Some(&user.email));
    let records = objects::match_by_person(
        conn,
        &user.organization_id,
        ObjectType::BackgroundCheck,
        &user.first_name,
        &user.last_name,
        &email,
        true,
    )?;

    match records.as_slice() {
        [] => Ok(None),
        [only] => link(conn, only, user, now).map(Some),
        many => {
            if let Some(object) =
                email_tie_break(many, &email, |o| normalized(o.field_str(fields::EMAIL)))
            {
                return link(conn, object, user, now).map(Some);
            }
            debug!(user = %user.id, records = many.len(), "user matches several background checks");
            Ok(Some(DomainEvent::BackgroundCheckMultipleMatch {
                organization_id: user.organization_id.clone(),
                subject: MatchSubject::User(user.id.clone()),
                candidates: many.iter().map(|o| o.id.clone()).collect(),
            }))
        }
    }
}

/// Create a `NEW` member for a harvested person record whose e-mail nobody
/// in the organization has yet. Returns the created user.
pub fn discover_person(
    conn: &Connection,
    organization_id: &str,
    data: &Map<String, Value>,
    now: DateTime<Utc>,
) -> Result<Option<User>, LaikaError> {
    let email = normalized(data.get(fields::EMAIL).and_then(Value::as_str));
    if email.is_empty() || users::get_user_by_email(conn, organization_id, &email)?.is_some() {
        return Ok(None);
    }
    let text = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string()
    };
    let user = User {
        id: new_id(),
        organization_id: organization_id.to_string(),
        email,
        first_name: text(fields::FIRST_NAME),
        last_name: text(fields::LAST_NAME),
        role: Role::OrganizationMember,
        preferences: UserPreferences::default(),
        discovery_state: DiscoveryState::New,
        employment_type: data
            .get("Employment Type")
            .and_then(Value::as_str)
            .map(str::to_string),
        is_active: true,
        date_joined: now,
    };
    users::insert_user(conn, &user)?;
    debug!(user = %user.id, organization = %organization_id, "person discovered");
    Ok(Some(user))
}

/// One `PeopleDiscovery` for the non-admin `NEW` users who joined today.
pub fn people_discovery_event(
    conn: &Connection,
    organization_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<DomainEvent>, LaikaError> {
    let today = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now);
    let quantity = users::count_new_non_admin_since(conn, organization_id, today)?;
    Ok((quantity > 0).then(|| DomainEvent::PeopleDiscovery {
        organization_id: organization_id.to_string(),
        quantity,
    }))
}

/// Bus subscriber running record-to-user matching on new background checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Correlator;

impl EventSubscriber for Correlator {
    fn name(&self) -> &'static str {
        "correlator"
    }

    fn interested_in(&self, kind: EventKind) -> bool {
        kind == EventKind::ObjectCreated
    }

    fn handle(
        &self,
        tx: &Connection,
        event: &DomainEvent,
        ctx: &mut EventContext,
    ) -> Result<(), LaikaError> {
        let DomainEvent::ObjectCreated {
            object_id,
            object_type: ObjectType::BackgroundCheck,
            ..
        } = event
        else {
            return Ok(());
        };
        let Some(object) = objects::get_object(tx, object_id)? else {
            return Ok(());
        };
        if let Some(follow_up) = correlate_object(tx, &object, ctx.now)? {
            ctx.emit(follow_up);
        }
        Ok(())
    }
}
