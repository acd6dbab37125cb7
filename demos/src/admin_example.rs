use std::env;

use dotenv::dotenv;
use tutor_booking::groups::{GroupUpdate, NewGroup};
use tutor_booking::prelude::*;
use tutor_booking::students::StudentFilter;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    pretty_env_logger::init();

    let client = TutorBooking::from_env()?;

    let username = env::var("TUTOR_BOOKING_ADMIN_USERNAME").map_err(|_| "TUTOR_BOOKING_ADMIN_USERNAME must be set")?;
    let password = env::var("TUTOR_BOOKING_ADMIN_PASSWORD").map_err(|_| "TUTOR_BOOKING_ADMIN_PASSWORD must be set")?;

    client.auth().login(&Credentials::new(&username, &password)).await?;
    if !client.auth().user().map_or(false, |u| u.is_staff) {
        return Err("this example needs a staff account".into());
    }

    let stats = client.dashboard().stats().await?;
    println!(
        "Dashboard: {} groups ({} open), {} students, {} bookings",
        stats.total_groups, stats.open_groups, stats.total_students, stats.total_bookings
    );

    let groups = client.groups();

    println!("Creating a group");
    let group = groups
        .create(&NewGroup {
            name: "Prep evening".to_string(),
            stage: Stage::Prep,
            capacity: 8,
            schedule: "6:00 PM".to_string(),
            days: "حد، أربع".to_string(),
        })
        .await?;
    println!("Created group #{} with {} seats", group.id, group.seats_left);

    let update = GroupUpdate {
        capacity: Some(10),
        ..Default::default()
    };
    let group = groups.update(group.id, &update).await?;
    println!("Capacity raised to {}", group.capacity);

    println!("\nAll bookings");
    for booking in client.bookings().list_all().await? {
        println!(
            "  #{} student {} in group {} at {}",
            booking.id, booking.student_id, booking.group_id, booking.created_at
        );
    }

    println!("\nStudents");
    let students = client.students().list(&StudentFilter::default()).await?;
    println!("{} students registered", students.count);
    for student in &students.results {
        println!("  {} ({})", student.full_name, student.stage.display_name());
    }

    println!("\nAccounts");
    let users = client.auth().list_users(None).await?;
    for user in &users.results {
        println!("  {} staff={}", user.username, user.is_staff);
    }

    groups.delete(group.id).await?;
    println!("\nDeleted group #{}", group.id);

    client.auth().logout()?;
    Ok(())
}
