//! Grant key command handler

use crate::state::SharedState;

pub async fn cmd_grant_key(
    state: &SharedState,
    user_id: &str,
    days: Option<i64>,
) -> anyhow::Result<()> {
    let key = state.admin.create_key_for_user(user_id, days).await?;

    println!("Issued API key for {user_id}");
    println!("  ID:      {}", key.id);
    println!("  Key:     {}", key.key);
    println!(
        "  Expires: {}",
        key.expires_at.as_deref().unwrap_or("never")
    );

    Ok(())
}
