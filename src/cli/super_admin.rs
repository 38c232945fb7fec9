use std::sync::Arc;

use crate::app_data::AppData;
use crate::coordinators::AdminCoordinator;
use crate::types::internal::action_outcome::SideChannel;
use crate::types::internal::context::RequestContext;

/// Create a SuperAdmin account and print its generated password once
pub async fn create_super_admin(
    app_data: &Arc<AppData>,
    username: &str,
    email: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = RequestContext::for_cli("create-super-admin");
    let coordinator = AdminCoordinator::new(app_data.clone());

    let outcome = coordinator.create_super_admin(&ctx, username, email).await?;

    for report in outcome.reports(SideChannel::Audit) {
        if let Some(error) = &report.error {
            eprintln!("Warning: Failed to record SuperAdmin creation: {}", error);
        }
    }

    let creds = outcome.into_value();
    println!("\n✓ SuperAdmin account created");
    println!("  Id:       {}", creds.user.id);
    println!("  Username: {}", creds.user.username);
    println!("  Email:    {}", creds.user.email);
    println!("  Password: {}", creds.password);
    println!("\n⚠️  The password is shown once. Store it securely and change it after first login.\n");

    Ok(())
}
