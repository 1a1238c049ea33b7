//! The Group Former (§4.G): static-group fixation, GS-banded
//! class-balanced bucket filling, tentative placement, residual grouping
//! and redistribution. Grounded line-by-line on
//! `original_source/app/cogs/guild_events.py`'s `_assign_groups_enhanced`.

use std::collections::{HashMap, HashSet};

use crate::models::{MemberClass, MemberId, RosterMember, StaticGroup};

use super::bands::{band_index, compute_bands, GsBand};

const GROUP_CAPACITY: usize = 6;
const MIN_GROUP_SIZE: usize = 4;

/// A registrant as seen by the former: its derived class, gear score and
/// whether it registered `tentative` rather than `presence`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub member_id: MemberId,
    pub class: MemberClass,
    pub gs: i64,
    pub tentative: bool,
}

fn candidate_for(member_id: MemberId, tentative: bool, roster: &HashMap<MemberId, RosterMember>) -> Option<Candidate> {
    roster.get(&member_id).map(|r| Candidate {
        member_id,
        class: MemberClass::from_str_loose(&r.class),
        gs: r.gs as i64,
        tentative,
    })
}

fn is_dps_family(class: MemberClass) -> bool {
    matches!(class, MemberClass::MeleeDps | MemberClass::RangedDps)
}

/// §4.G scoring: class-match (0.7 exact / 0.5 DPS-family / 0.3 any DPS
/// class) + GS-band-match (0.2 same / 0.1 adjacent) + a registration-kind
/// term (0.1 confirmed / 0.05 tentative).
fn member_score(class: MemberClass, gs: i64, tentative: bool, target_class: MemberClass, target_band: usize, bands: &[GsBand]) -> f64 {
    let mut score = 0.0;
    if class == target_class {
        score += 0.7;
    } else if is_dps_family(target_class) && is_dps_family(class) {
        score += 0.5;
    } else if class.is_dps_family() {
        score += 0.3;
    }

    let member_band = band_index(gs, bands);
    if member_band == target_band {
        score += 0.2;
    } else if (member_band as i64 - target_band as i64).abs() == 1 {
        score += 0.1;
    }

    score += if tentative { 0.05 } else { 0.1 };
    score
}

struct IncompleteStatic {
    members: Vec<Candidate>,
    missing_slots: usize,
    original_ids: Vec<MemberId>,
}

/// Runs the full policy pipeline of §4.G and returns the ordered list of
/// groups. `presence` and `tentative` are iterated in caller order, which
/// is what gives the pipeline's otherwise-unordered steps (step 5's
/// residual sweep, step 6's redistribution) their determinism; GS bucket
/// iteration inside step 3 is sorted descending by gear score per the
/// tie-break rule (§4.G "Determinism").
pub fn form_groups(
    presence: &[MemberId],
    tentative: &[MemberId],
    roster: &HashMap<MemberId, RosterMember>,
    static_groups: &[StaticGroup],
) -> Vec<Vec<Candidate>> {
    let presence_set: HashSet<MemberId> = presence.iter().copied().collect();
    let tentative_set: HashSet<MemberId> = tentative.iter().copied().collect();

    let mut all_inscribed: Vec<MemberId> = Vec::with_capacity(presence.len() + tentative.len());
    let mut seen = HashSet::new();
    for &id in presence.iter().chain(tentative.iter()) {
        if seen.insert(id) {
            all_inscribed.push(id);
        }
    }

    let all_members: Vec<Candidate> = all_inscribed
        .iter()
        .filter_map(|&id| candidate_for(id, tentative_set.contains(&id) && !presence_set.contains(&id), roster))
        .collect();
    let gs_values: Vec<i64> = all_members.iter().map(|c| c.gs).collect();
    let bands = compute_bands(&gs_values);

    let mut used: HashSet<MemberId> = HashSet::new();
    let mut final_groups: Vec<Vec<Candidate>> = Vec::new();

    // Stage 1: static-group fixation.
    let mut incomplete: Vec<IncompleteStatic> = Vec::new();
    for group in static_groups {
        let present_members: Vec<MemberId> = group
            .members
            .iter()
            .copied()
            .filter(|id| presence_set.contains(id) && !used.contains(id))
            .collect();
        let configured_count = group.members.len();
        let present_count = present_members.len();
        if present_count == configured_count || (configured_count > 0 && present_count == configured_count - 1) {
            let mut members = Vec::with_capacity(present_members.len());
            for id in &present_members {
                if let Some(c) = candidate_for(*id, tentative_set.contains(id), roster) {
                    used.insert(*id);
                    members.push(c);
                }
            }
            if !members.is_empty() {
                incomplete.push(IncompleteStatic {
                    missing_slots: GROUP_CAPACITY.saturating_sub(members.len()),
                    members,
                    original_ids: group.members.clone(),
                });
            }
        }
    }

    // Stage 2: complete static groups from the remaining pool.
    for group in &mut incomplete {
        if group.missing_slots > 0 {
            let mut missing_classes: Vec<MemberClass> = Vec::new();
            if group.members.len() == group.original_ids.len().saturating_sub(1) {
                if let Some(missing_id) = group
                    .original_ids
                    .iter()
                    .find(|id| !group.members.iter().any(|m| m.member_id == **id))
                {
                    if let Some(info) = roster.get(*missing_id) {
                        missing_classes.push(MemberClass::from_str_loose(&info.class));
                    }
                }
            }
            let existing_classes: Vec<MemberClass> = group.members.iter().map(|m| m.class).collect();
            for essential in [MemberClass::Tank, MemberClass::Healer] {
                if !existing_classes.contains(&essential) {
                    missing_classes.push(essential);
                }
            }

            let mut available: Vec<MemberId> = all_inscribed
                .iter()
                .copied()
                .filter(|id| !used.contains(id) && !group.original_ids.contains(id))
                .collect();

            for _ in 0..group.missing_slots {
                let mut best: Option<(MemberId, Candidate, f64)> = None;
                for &id in &available {
                    let Some(info) = candidate_for(id, tentative_set.contains(&id), roster) else { continue };
                    let target_class = if !missing_classes.is_empty() && missing_classes.contains(&info.class) {
                        missing_classes[0]
                    } else {
                        MemberClass::MeleeDps
                    };
                    let score = member_score(info.class, info.gs, info.tentative, target_class, 0, &bands);
                    if best.as_ref().map(|(_, _, s)| score > *s).unwrap_or(score > 0.0) {
                        best = Some((id, info, score));
                    }
                }
                let Some((id, info, _)) = best else { break };
                available.retain(|x| *x != id);
                used.insert(id);
                if let Some(pos) = missing_classes.iter().position(|c| *c == info.class) {
                    missing_classes.remove(pos);
                }
                group.members.push(info);
            }
        }
        final_groups.push(std::mem::take(&mut group.members));
    }

    // Stage 3: optimized per-band filling, highest GS band first.
    let mut buckets: Vec<HashMap<MemberClass, Vec<Candidate>>> = (0..bands.len()).map(|_| HashMap::new()).collect();
    for &id in presence {
        if used.contains(&id) {
            continue;
        }
        if let Some(info) = candidate_for(id, false, roster) {
            let idx = band_index(info.gs, &bands);
            buckets[idx].entry(info.class).or_default().push(info);
        }
    }
    for bucket in &mut buckets {
        for members in bucket.values_mut() {
            members.sort_by(|a, b| b.gs.cmp(&a.gs));
        }
    }

    for gs_idx in (0..bands.len()).rev() {
        loop {
            let flankers = buckets[gs_idx].entry(MemberClass::Flanker).or_default();
            if flankers.len() < 5 {
                break;
            }
            let take = if flankers.len() >= 6 { 6 } else { 5 };
            let group: Vec<Candidate> = flankers.drain(0..take).collect();
            for c in &group {
                used.insert(c.member_id);
            }
            final_groups.push(group);
        }

        loop {
            let has_tank = buckets[gs_idx].get(&MemberClass::Tank).map(|v| !v.is_empty()).unwrap_or(false);
            let has_healer = buckets[gs_idx].get(&MemberClass::Healer).map(|v| !v.is_empty()).unwrap_or(false);
            if !(has_tank && has_healer) {
                break;
            }
            let mut group = Vec::with_capacity(GROUP_CAPACITY);
            {
                let tanks = buckets[gs_idx].entry(MemberClass::Tank).or_default();
                let take = tanks.len().min(2);
                group.extend(tanks.drain(0..take));
            }
            {
                let healers = buckets[gs_idx].entry(MemberClass::Healer).or_default();
                let take = healers.len().min(2);
                group.extend(healers.drain(0..take));
            }
            let mut remaining_slots = GROUP_CAPACITY - group.len();
            for dps_class in [MemberClass::MeleeDps, MemberClass::RangedDps, MemberClass::Flanker] {
                let pool = buckets[gs_idx].entry(dps_class).or_default();
                while remaining_slots > 0 && !pool.is_empty() {
                    group.push(pool.remove(0));
                    remaining_slots -= 1;
                }
            }

            if group.len() >= MIN_GROUP_SIZE {
                for c in &group {
                    used.insert(c.member_id);
                }
                final_groups.push(group);
            } else {
                for c in group {
                    buckets[gs_idx].entry(c.class).or_default().push(c);
                }
                break;
            }
        }
    }

    // Stage 4: tentative placement into existing groups with free slots.
    for &id in tentative {
        if used.contains(&id) || presence_set.contains(&id) {
            continue;
        }
        let Some(info) = candidate_for(id, true, roster) else { continue };
        if final_groups.is_empty() {
            continue;
        }
        let mut best_idx: Option<usize> = None;
        let mut best_score = 0.0;
        for (i, group) in final_groups.iter().enumerate() {
            if group.len() >= GROUP_CAPACITY {
                continue;
            }
            let avg_gs = if group.is_empty() {
                0
            } else {
                group.iter().map(|m| m.gs).sum::<i64>() / group.len() as i64
            };
            let target_band = band_index(avg_gs, &bands);
            let score = member_score(info.class, info.gs, true, MemberClass::MeleeDps, target_band, &bands);
            if score > best_score {
                best_score = score;
                best_idx = Some(i);
            }
        }
        if let Some(i) = best_idx {
            final_groups[i].push(info);
            used.insert(id);
        }
    }

    // Stage 5: residual grouping from whatever remains, ≥4 at a time.
    let mut remaining: Vec<MemberId> = all_inscribed.iter().copied().filter(|id| !used.contains(id)).collect();
    while remaining.len() >= MIN_GROUP_SIZE {
        let take = remaining.len().min(GROUP_CAPACITY);
        let chunk: Vec<MemberId> = remaining.drain(0..take).collect();
        let group: Vec<Candidate> = chunk
            .iter()
            .filter_map(|&id| candidate_for(id, tentative_set.contains(&id) && !presence_set.contains(&id), roster))
            .collect();
        for c in &group {
            used.insert(c.member_id);
        }
        if group.len() >= MIN_GROUP_SIZE {
            final_groups.push(group);
        }
    }

    // Stage 6: redistribute whatever is left into free slots, last resort partial group.
    let mut final_remaining: Vec<MemberId> = all_inscribed.iter().copied().filter(|id| !used.contains(id)).collect();
    final_remaining.retain(|&id| {
        let Some(info) = candidate_for(id, tentative_set.contains(&id) && !presence_set.contains(&id), roster) else {
            return false;
        };
        for group in final_groups.iter_mut() {
            if group.len() < GROUP_CAPACITY {
                group.push(info);
                used.insert(id);
                return false;
            }
        }
        true
    });

    if !final_remaining.is_empty() {
        let last_group: Vec<Candidate> = final_remaining
            .iter()
            .filter_map(|&id| candidate_for(id, tentative_set.contains(&id) && !presence_set.contains(&id), roster))
            .collect();
        if !last_group.is_empty() {
            final_groups.push(last_group);
        }
    }

    final_groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(guild: i64, id: i64, class: &str, gs: i32) -> (MemberId, RosterMember) {
        (
            MemberId(id),
            RosterMember {
                guild_id: crate::models::GuildId(guild),
                member_id: MemberId(id),
                username: format!("m{id}"),
                language: "en".to_string(),
                gs,
                build: None,
                weapons: "NULL".to_string(),
                class: class.to_string(),
                dkp: 0,
                nb_events: 0,
                registrations: 0,
                attendances: 0,
            },
        )
    }

    #[test]
    fn every_registrant_appears_in_exactly_one_group() {
        let mut roster = HashMap::new();
        let mut presence = Vec::new();
        let classes = ["Tank", "Tank", "Tank", "Tank", "Healer", "Healer", "Healer", "Healer"];
        let mut next_id = 1;
        for class in classes.iter() {
            for _ in 0..1 {
                let (id, m) = member(1, next_id, class, 2000 + next_id as i32 * 10);
                roster.insert(id, m);
                presence.push(id);
                next_id += 1;
            }
        }
        for _ in 0..16 {
            let (id, m) = member(1, next_id, "Melee DPS", 2200 + next_id as i32 * 5);
            roster.insert(id, m);
            presence.push(id);
            next_id += 1;
        }

        let groups = form_groups(&presence, &[], &roster, &[]);
        let mut seen = HashSet::new();
        for group in &groups {
            assert!(group.len() <= GROUP_CAPACITY);
            for member in group {
                assert!(seen.insert(member.member_id), "member placed twice");
            }
        }
        assert_eq!(seen.len(), presence.len());
    }

    #[test]
    fn static_group_missing_one_member_is_filled_preferring_missing_essential_class() {
        let mut roster = HashMap::new();
        let mut presence = Vec::new();
        for (id, class) in [(1, "Tank"), (2, "Melee DPS"), (3, "Melee DPS"), (4, "Ranged DPS"), (5, "Flanker")] {
            let (mid, m) = member(1, id, class, 2500);
            roster.insert(mid, m);
            presence.push(mid);
        }
        // Candidate pool member outside the static roster, a Healer (the static group's missing class).
        let (healer_id, healer) = member(1, 6, "Healer", 2500);
        roster.insert(healer_id, healer);
        presence.push(healer_id);

        let static_group = StaticGroup {
            id: 1,
            guild_id: crate::models::GuildId(1),
            group_name: "Alpha".to_string(),
            leader_id: MemberId(1),
            is_active: true,
            members: vec![MemberId(1), MemberId(2), MemberId(3), MemberId(4), MemberId(5), MemberId(7)],
        };

        let groups = form_groups(&presence, &[], &roster, std::slice::from_ref(&static_group));
        let alpha = groups.iter().find(|g| g.iter().any(|m| m.member_id == MemberId(1))).unwrap();
        assert!(alpha.iter().any(|m| m.class == MemberClass::Healer));
    }

    #[test]
    fn no_group_is_smaller_than_four_except_a_final_partial_group() {
        let mut roster = HashMap::new();
        let mut presence = Vec::new();
        for id in 1..=7 {
            let (mid, m) = member(1, id, "Melee DPS", 2000);
            roster.insert(mid, m);
            presence.push(mid);
        }
        let groups = form_groups(&presence, &[], &roster, &[]);
        for (i, group) in groups.iter().enumerate() {
            if i + 1 < groups.len() {
                assert!(group.len() >= MIN_GROUP_SIZE);
            }
        }
    }
}
