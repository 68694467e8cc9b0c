//! Terminal rendering for inbox, email detail and draft lists

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{
    ConfidenceBand, Draft, DraftAnalysis, Email, EmailPage, FolderTab, GmailMessage,
};

/// `"Name" <addr>` or `Name <addr>`
static DISPLAY_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"?([^"<]+?)"?\s*<[^>]*>$"#).expect("valid display name regex"));

/// Human name for a From header, falling back to the address local part
pub fn sender_display_name(from: &str) -> String {
    let from = from.trim();
    if let Some(caps) = DISPLAY_NAME_RE.captures(from) {
        let name = caps[1].trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }

    let address = from.trim_start_matches('<').trim_end_matches('>');
    match address.split('@').next() {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => "Unknown".to_string(),
    }
}

/// Up to two initials for an avatar badge
pub fn initials(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .collect();
    if letters.is_empty() {
        "?".to_string()
    } else {
        letters.to_uppercase()
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len.saturating_sub(3)).collect::<String>())
    }
}

pub fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(at);
    if age.num_minutes() < 1 {
        "just now".to_string()
    } else if age.num_hours() < 1 {
        format!("{}m ago", age.num_minutes())
    } else if age.num_days() < 1 {
        format!("{}h ago", age.num_hours())
    } else if age.num_days() < 7 {
        format!("{}d ago", age.num_days())
    } else {
        at.format("%b %d").to_string()
    }
}

pub fn folder_label(tab: FolderTab) -> &'static str {
    match tab {
        FolderTab::Inbox => "Inbox",
        FolderTab::Drafts => "Drafts",
        FolderTab::Sent => "Sent",
    }
}

fn band_label(band: ConfidenceBand) -> &'static str {
    match band {
        ConfidenceBand::High => "high",
        ConfidenceBand::Medium => "medium",
        ConfidenceBand::Low => "low",
    }
}

/// Inbox listing; `None` means the page is still loading
pub fn render_inbox(tab: FolderTab, page: Option<&EmailPage>, now: DateTime<Utc>) -> String {
    let mut out = format!("{}\n", folder_label(tab));

    let page = match page {
        None => {
            out.push_str("  Loading emails...\n");
            return out;
        }
        Some(page) => page,
    };

    if page.emails.is_empty() {
        out.push_str(&format!(
            "  No emails in {}\n",
            folder_label(tab).to_lowercase()
        ));
        return out;
    }

    push_email_rows(&mut out, &page.emails, now);
    if page.next_page_token.is_some() {
        out.push_str("  (more results available)\n");
    }
    out
}

/// Search hits, headed by the query instead of a folder
pub fn render_search_results(query: &str, emails: &[Email], now: DateTime<Utc>) -> String {
    let mut out = format!("Search: {}\n", query);
    if emails.is_empty() {
        out.push_str("  No emails match\n");
    } else {
        push_email_rows(&mut out, emails, now);
    }
    out
}

fn push_email_rows(out: &mut String, emails: &[Email], now: DateTime<Utc>) {
    for email in emails {
        let sender = sender_display_name(&email.from);
        let marker = if email.is_read { ' ' } else { '*' };
        let important = if email.is_important { '!' } else { ' ' };
        out.push_str(&format!(
            "{}{} {:<12} [{}] {:<20} {:<40} {}\n",
            marker,
            important,
            truncate_string(&email.id, 12),
            initials(&sender),
            truncate_string(&sender, 20),
            truncate_string(email.subject_or_placeholder(), 40),
            format_age(email.received_at, now),
        ));
    }
}

pub fn render_email(email: &Email) -> String {
    let mut out = String::new();
    out.push_str(&format!("Subject: {}\n", email.subject_or_placeholder()));
    out.push_str(&format!("From:    {}\n", email.from));
    if let Some(ref to) = email.to {
        out.push_str(&format!("To:      {}\n", to));
    }
    if let Some(ref cc) = email.cc {
        out.push_str(&format!("Cc:      {}\n", cc));
    }
    out.push_str(&format!(
        "Date:    {}\n",
        email.received_at.format("%Y-%m-%d %H:%M")
    ));
    if !email.labels.is_empty() {
        let labels: Vec<&str> = email.labels.iter().map(String::as_str).collect();
        out.push_str(&format!("Labels:  {}\n", labels.join(", ")));
    }
    for attachment in &email.attachments {
        out.push_str(&format!(
            "Attach:  {} ({} bytes)\n",
            attachment.filename, attachment.size
        ));
    }
    out.push('\n');

    let body = email
        .body
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or(&email.snippet);
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Draft list with the selected draft marked by `>`
pub fn render_drafts(drafts: &[Draft], selected_id: Option<&str>) -> String {
    if drafts.is_empty() {
        return "  No drafts yet. Generate one to get started.\n".to_string();
    }

    let mut out = String::new();
    for (i, draft) in drafts.iter().enumerate() {
        let marker = if Some(draft.id.as_str()) == selected_id { '>' } else { ' ' };
        out.push_str(&format!(
            "{} {}. [{}] {:.0}% {} ({})",
            marker,
            i + 1,
            draft.status,
            draft.confidence_score * 100.0,
            band_label(draft.confidence_band()),
            draft.id,
        ));
        if let Some(ref meta) = draft.metadata {
            if let Some(ref tone) = meta.tone {
                out.push_str(&format!(" tone: {}", tone));
            }
        }
        out.push('\n');
        out.push_str(&format!(
            "     {}\n",
            truncate_string(&draft.content.replace('\n', " "), 70)
        ));
    }
    out
}

pub fn render_analysis(analysis: &DraftAnalysis) -> String {
    let mut out = format!(
        "Intent: {}\nTone: {}\nStrategy: {}\n",
        analysis.intent, analysis.tone, analysis.strategy
    );
    for point in &analysis.key_points {
        out.push_str(&format!("  - {}\n", point));
    }
    out
}

pub fn render_gmail_list(messages: &[GmailMessage], now: DateTime<Utc>) -> String {
    if messages.is_empty() {
        return "  No messages\n".to_string();
    }
    messages
        .iter()
        .map(|m| {
            format!(
                "{}{:<12} {:<20} {:<40} {}\n",
                if m.is_processed { ' ' } else { '*' },
                truncate_string(&m.id, 12),
                truncate_string(&sender_display_name(&m.from_email), 20),
                truncate_string(&m.subject, 40),
                format_age(m.received_at, now),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DraftStatus;
    use chrono::Duration;

    #[test]
    fn test_sender_display_name() {
        assert_eq!(sender_display_name("\"Alice Smith\" <alice@example.com>"), "Alice Smith");
        assert_eq!(sender_display_name("Bob Jones <bob@example.com>"), "Bob Jones");
        assert_eq!(sender_display_name("carol@example.com"), "carol");
        assert_eq!(sender_display_name("<dave@example.com>"), "dave");
        assert_eq!(sender_display_name(""), "Unknown");
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials("alice smith"), "AS");
        assert_eq!(initials("Bob"), "B");
        assert_eq!(initials("  "), "?");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("a longer subject line", 10), "a longe...");
        assert_eq!(truncate_string("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(now, now), "just now");
        assert_eq!(format_age(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_age(now - Duration::hours(3), now), "3h ago");
        assert_eq!(format_age(now - Duration::days(2), now), "2d ago");
    }

    #[test]
    fn test_inbox_states() {
        let now = Utc::now();
        assert!(render_inbox(FolderTab::Inbox, None, now).contains("Loading emails"));

        let empty = EmailPage {
            emails: Vec::new(),
            next_page_token: None,
        };
        assert!(render_inbox(FolderTab::Sent, Some(&empty), now).contains("No emails in sent"));
    }

    #[test]
    fn test_search_results_are_headed_by_query() {
        let now = Utc::now();
        let email: Email = serde_json::from_value(serde_json::json!({
            "id": "e9",
            "thread_id": "t9",
            "from": "Bob Jones <bob@example.com>",
            "subject": "Invoice 42",
            "received_at": now.to_rfc3339(),
        }))
        .unwrap();

        let out = render_search_results("invoice", &[email], now);
        assert!(out.starts_with("Search: invoice\n"));
        assert!(!out.contains("Inbox"));
        assert!(out.contains("Invoice 42"));
        assert!(render_search_results("nothing", &[], now).contains("No emails match"));
    }

    #[test]
    fn test_drafts_mark_selection_and_band() {
        let draft = Draft {
            id: "d1".to_string(),
            email_id: "e1".to_string(),
            user_id: "u1".to_string(),
            content: "Thanks,\nwill review.".to_string(),
            confidence_score: 0.85,
            status: DraftStatus::Draft,
            metadata: None,
            created_at: Utc::now(),
            sent_at: None,
        };
        let out = render_drafts(&[draft], Some("d1"));
        assert!(out.starts_with("> 1. [draft] 85% high (d1)"));
        assert!(out.contains("Thanks, will review."));
    }
}
