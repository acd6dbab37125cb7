use std::env;
use std::sync::Arc;

use dotenv::dotenv;
use log::info;
use tutor_booking::prelude::*;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    pretty_env_logger::init();

    // Reads TUTOR_BOOKING_API_URL and friends
    let client = TutorBooking::from_env()?;

    let username = env::var("TUTOR_BOOKING_USERNAME").map_err(|_| "TUTOR_BOOKING_USERNAME must be set")?;
    let password = env::var("TUTOR_BOOKING_PASSWORD").map_err(|_| "TUTOR_BOOKING_PASSWORD must be set")?;

    let mut events = client.auth().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!("Session event: {:?}", event);
        }
    });

    println!("Signing in as {}", username);
    let session = client.auth().login(&Credentials::new(&username, &password)).await?;
    if let Some(user) = &session.user {
        println!("Signed in: {} (staff: {})", user.username, user.is_staff);
    }
    match session.claims() {
        Ok(claims) => println!(
            "Access token for user {:?} expires at {:?} (expired: {})",
            claims.user_id(),
            claims.expires_at(),
            session.is_expired()
        ),
        Err(e) => println!("Could not read the access token: {}", e),
    }

    let flow = client.booking_flow(Arc::new(LogNotifier));

    println!("\nListing 6th grade groups");
    let groups = flow.load_groups(&GroupFilter::new().stage(Stage::Grade6)).await?;
    for group in &groups {
        println!(
            "  #{} {} [{}] {} / {} seats left, {}",
            group.id,
            group.name,
            group.stage.display_name(),
            group.seats_left,
            group.capacity,
            flow.membership(group.id).label()
        );
    }

    let Some(target) = groups.iter().find(|g| flow.can_join(g.id)) else {
        println!("\nNo group with free seats to join");
        return Ok(());
    };
    let group_id = target.id;

    println!("\nJoining group #{}", group_id);
    flow.join(group_id).await?;
    if let Some(group) = flow.group(group_id) {
        println!("Seats left after joining: {}", group.seats_left);
    }

    println!("\nLeaving group #{}", group_id);
    flow.leave(group_id).await?;
    println!("Membership now: {:?}", flow.membership(group_id));

    client.auth().logout()?;
    println!("\nBooking example completed");

    Ok(())
}
