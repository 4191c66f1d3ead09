// API Hashing
//
// Deterministic fingerprints over the API model: a whole-API hash, a
// trait-private extra hash, and per-name hashes tagged with use scopes.
// All hashes are 64-bit FNV-1a folds over a canonical feed.

use crate::api::analyzed::NameHash;
use crate::api::model::{simple_name_of, ClassLike, Companions, Member};
use crate::names::UseScope;
use fnv::FnvHasher;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::hash::Hasher;

fn feed_str(hasher: &mut FnvHasher, value: &str) {
    hasher.write(value.as_bytes());
    hasher.write_u8(0);
}

fn feed_member(hasher: &mut FnvHasher, member: &Member) {
    feed_str(hasher, &member.name);
    feed_str(hasher, &member.signature);
    hasher.write_u8(u8::from(member.modifiers.is_private));
    hasher.write_u8(u8::from(member.modifiers.is_implicit));
    hasher.write_u8(u8::from(member.modifiers.is_sealed));
}

fn member_hash(member: &Member) -> u64 {
    let mut hasher = FnvHasher::default();
    feed_member(&mut hasher, member);
    hasher.finish()
}

/// Public members of a side, declared and inherited, in a canonical order.
fn public_members(side: &ClassLike) -> Vec<&Member> {
    let mut members: Vec<&Member> = side
        .structure
        .declared
        .iter()
        .chain(side.structure.inherited.iter())
        .filter(|member| !member.modifiers.is_private)
        .collect();
    members.sort_by(|a, b| (&a.name, &a.signature).cmp(&(&b.name, &b.signature)));
    members
}

fn feed_side(hasher: &mut FnvHasher, side: &ClassLike) {
    feed_str(hasher, &side.name);
    hasher.write_u8(side.definition_type as u8);
    hasher.write_u8(u8::from(side.modifiers.is_sealed));
    hasher.write_u8(u8::from(side.has_macro));
    // Parent order is linearization order and must stay significant.
    for parent in &side.structure.parents {
        feed_str(hasher, parent);
    }
    for member in public_members(side) {
        feed_member(hasher, member);
    }
    for child in &side.child_types {
        feed_str(hasher, child);
    }
}

/// Hashes the whole public API of both companions deterministically.
pub fn api_hash(companions: &Companions) -> u64 {
    let mut hasher = FnvHasher::default();
    for side in companions.sides() {
        feed_side(&mut hasher, side);
    }
    hasher.finish()
}

/// Additionally folds private members of trait sides. Used only as a
/// tie-break signal: an extra-hash drift with an unchanged API hash marks
/// a private trait-member modification.
pub fn extra_hash(companions: &Companions) -> u64 {
    let mut hasher = FnvHasher::default();
    for side in companions.sides().filter(|side| side.is_trait()) {
        let mut privates: Vec<&Member> = side
            .structure
            .declared
            .iter()
            .filter(|member| member.modifiers.is_private)
            .collect();
        privates.sort_by(|a, b| (&a.name, &a.signature).cmp(&(&b.name, &b.signature)));
        feed_str(&mut hasher, &side.name);
        for member in privates {
            feed_member(&mut hasher, member);
        }
    }
    hasher.finish()
}

/// Per-name hashes over the members contributing to each top-level name,
/// tagged with a use scope. Class and companion-object rows are merged by
/// (name, scope) with an order-independent xor fold.
pub fn name_hashes(companions: &Companions) -> SmallVec<[NameHash; 8]> {
    let mut rows: BTreeMap<(String, UseScope), u64> = BTreeMap::new();
    let mut combine = |name: &str, scope: UseScope, hash: u64| {
        *rows.entry((name.to_string(), scope)).or_insert(0) ^= hash;
    };

    for side in companions.sides() {
        for member in public_members(side) {
            combine(&member.name, UseScope::Default, member_hash(member));
            if member.modifiers.is_implicit {
                combine(&member.name, UseScope::Implicit, member_hash(member));
            }
        }
        // The definition's own simple name is a referable name too. Its row
        // covers the parent list and the definition shape, so structural
        // edits surface even when no member changed.
        let mut hasher = FnvHasher::default();
        feed_str(&mut hasher, &side.name);
        hasher.write_u8(side.definition_type as u8);
        for parent in &side.structure.parents {
            feed_str(&mut hasher, parent);
        }
        combine(side.simple_name(), UseScope::Default, hasher.finish());

        if side.modifiers.is_sealed {
            let mut hasher = FnvHasher::default();
            for child in &side.child_types {
                feed_str(&mut hasher, simple_name_of(child));
            }
            combine(side.simple_name(), UseScope::PatternTarget, hasher.finish());
        }
    }

    rows.into_iter()
        .map(|((name, scope), hash)| NameHash { name, scope, hash })
        .collect()
}

/// Strips payload that does not contribute to any hash before storage:
/// private members of non-trait sides. Trait privates stay, the extra
/// hash still needs them on the next comparison. A debug build of the API
/// store keeps everything.
pub fn minimize(companions: &Companions, api_debug: bool) -> Companions {
    if api_debug {
        return companions.clone();
    }
    let strip = |side: &ClassLike| -> ClassLike {
        let mut side = side.clone();
        if !side.is_trait() {
            side.structure.declared.retain(|member| !member.modifiers.is_private);
        }
        side.structure.inherited.retain(|member| !member.modifiers.is_private);
        side
    };
    Companions {
        class_like: strip(&companions.class_like),
        object_like: companions.object_like.as_ref().map(strip),
    }
}
