use ayurwell_core::{ActivityItem, ActivityKind, FollowUp, PrakritiRecord, UserProfile};

const FEEDBACK_PREVIEW_CHARS: usize = 50;

pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head = chars.by_ref().take(max_chars).collect::<String>();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

pub(crate) fn result_summary(record: &PrakritiRecord) -> String {
    format!(
        "Completed Prakriti analysis ({})",
        record.prakriti_type.label()
    )
}

pub(crate) fn follow_up_summary(item: &FollowUp) -> String {
    let feedback = item.feedback.trim();
    if feedback.is_empty() {
        "Added follow-up".to_string()
    } else {
        format!(
            "Added follow-up: {}",
            preview(feedback, FEEDBACK_PREVIEW_CHARS)
        )
    }
}

/// Merges both feeds newest first. Equal timestamps keep results ahead of
/// follow-ups.
pub(crate) fn merge_activity(
    results: Vec<PrakritiRecord>,
    follow_ups: Vec<FollowUp>,
    profiles: &[UserProfile],
    limit: usize,
) -> Vec<ActivityItem> {
    let lookup = |user_id: &str| profiles.iter().find(|profile| profile.user_id == user_id);

    let mut items = results
        .iter()
        .map(|record| {
            let owner = lookup(&record.user_id);
            ActivityItem {
                kind: ActivityKind::Prakriti,
                id: record.result_id.clone(),
                user_id: record.user_id.clone(),
                user_name: owner.map(|profile| profile.name.clone()),
                user_email: owner.map(|profile| profile.email.clone()),
                created_at: record.created_at,
                summary: result_summary(record),
            }
        })
        .chain(follow_ups.iter().map(|item| {
            let owner = lookup(&item.user_id);
            ActivityItem {
                kind: ActivityKind::FollowUp,
                id: item.follow_up_id.clone(),
                user_id: item.user_id.clone(),
                user_name: owner.map(|profile| profile.name.clone()),
                user_email: owner.map(|profile| profile.email.clone()),
                created_at: item.created_at,
                summary: follow_up_summary(item),
            }
        }))
        .collect::<Vec<_>>();

    items.sort_by(|lhs, rhs| rhs.created_at.cmp(&lhs.created_at));
    items.truncate(limit);
    items
}
