//! List users command handler

use crate::constants::limits::DEFAULT_PAGE_SIZE;
use crate::state::SharedState;

pub async fn cmd_list_users(state: &SharedState, page: u64) -> anyhow::Result<()> {
    let page = page.max(1);
    let users = state.admin.list_users(page, DEFAULT_PAGE_SIZE).await?;

    if users.items.is_empty() {
        println!("No users on page {page} ({} total).", users.total);
        return Ok(());
    }

    println!("Users ({} total, page {page})", users.total);
    println!("{:-<70}", "");

    for summary in users.items {
        let admin = if state.admin_gate.is_admin(&summary.user.auth_center_user_id) {
            " [admin]"
        } else {
            ""
        };
        let key = if summary.has_api_key { "yes" } else { "no" };

        println!(
            "{} {}{}",
            summary.user.id,
            summary.user.nickname.as_deref().unwrap_or("-"),
            admin
        );
        println!(
            "  Auth center: {} | API key: {} | Since: {}",
            summary.user.auth_center_user_id, key, summary.user.created_at
        );
    }

    Ok(())
}
