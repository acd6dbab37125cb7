mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tutor_booking::auth::{SessionEvent, SessionStore, ACCESS_KEY};
use tutor_booking::bookings::{enrolled_groups, BookingFlow, Membership};
use tutor_booking::error::{Error, ErrorKind, Rejection};
use tutor_booking::groups::GroupFilter;
use tutor_booking::notice::{Notice, NoticeLevel};
use tutor_booking::TutorBooking;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{booking_json, client, group_json};

const JOINED: &str = "تم الانضمام إلى المجموعة بنجاح!";
const LEFT: &str = "تم مغادرة المجموعة بنجاح";

fn flow(client: &TutorBooking) -> (BookingFlow, UnboundedReceiver<Notice>) {
    let (tx, rx) = mpsc::unbounded_channel::<Notice>();
    (client.booking_flow(Arc::new(tx)), rx)
}

async fn mount_group(server: &MockServer, id: i64, seats_left: i64, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(format!("/api/groups/{}/", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(group_json(id, seats_left)));
    match times {
        Some(n) => mock.up_to_n_times(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

async fn mount_bookings(server: &MockServer, groups: &[i64], times: Option<u64>) {
    let body: Vec<_> = groups
        .iter()
        .enumerate()
        .map(|(i, g)| booking_json(i as i64 + 1, *g))
        .collect();
    let mock = Mock::given(method("GET"))
        .and(path("/api/bookings/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));
    match times {
        Some(n) => mock.up_to_n_times(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

fn action(verb: &str, id: i64) -> String {
    format!("/api/bookings/group/{}/{}/", id, verb)
}

#[tokio::test]
async fn test_join_replaces_optimistic_state_with_server_state() {
    let mock_server = MockServer::start().await;

    mount_group(&mock_server, 7, 1, Some(1)).await;
    mount_group(&mock_server, 7, 0, None).await;
    mount_bookings(&mock_server, &[], Some(1)).await;
    mount_bookings(&mock_server, &[7], None).await;
    Mock::given(method("POST"))
        .and(path(action("join", 7)))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"message": JOINED})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _store) = client(&mock_server, Some("T1"), Some("R1"));
    let (flow, mut notices) = flow(&client);

    assert_eq!(flow.membership(7), Membership::Unknown);
    flow.load_group(7).await.unwrap();
    assert_eq!(flow.membership(7), Membership::NotEnrolled);
    assert!(flow.can_join(7));

    flow.join(7).await.unwrap();

    let group = flow.group(7).unwrap();
    assert_eq!(group.seats_left, 0);
    assert!(group.is_full);
    assert_eq!(group.availability_label(), "مكتملة");
    assert_eq!(flow.membership(7).label(), "مسجل");
    assert!(!flow.is_busy());
    assert!(flow.can_leave(7));

    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Success);
    assert_eq!(notice.message, JOINED);
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn test_membership_flips_before_server_answers() {
    let mock_server = MockServer::start().await;

    mount_group(&mock_server, 7, 3, None).await;
    mount_bookings(&mock_server, &[], Some(1)).await;
    mount_bookings(&mock_server, &[7], None).await;
    Mock::given(method("POST"))
        .and(path(action("join", 7)))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"message": JOINED}))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&mock_server)
        .await;

    let (client, _store) = client(&mock_server, Some("T1"), Some("R1"));
    let (flow, _notices) = flow(&client);
    flow.load_group(7).await.unwrap();

    let (result, _) = tokio::join!(flow.join(7), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(flow.membership(7), Membership::Enrolled);
        assert!(flow.is_busy());
        assert!(!flow.can_join(7));
        assert!(!flow.can_leave(7));
    });

    result.unwrap();
    assert!(!flow.is_busy());
}

#[tokio::test]
async fn test_full_group_is_refused_without_request() {
    let mock_server = MockServer::start().await;

    mount_group(&mock_server, 7, 0, None).await;
    mount_bookings(&mock_server, &[], None).await;
    Mock::given(method("POST"))
        .and(path(action("join", 7)))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (client, _store) = client(&mock_server, Some("T1"), Some("R1"));
    let (flow, mut notices) = flow(&client);
    let group = flow.load_group(7).await.unwrap();
    assert_eq!(group.availability_label(), "مكتملة");
    assert!(!flow.can_join(7));

    let err = flow.join(7).await.unwrap_err();

    assert!(matches!(err, Error::Rejected(Rejection::GroupFull)));
    assert_eq!(flow.membership(7), Membership::NotEnrolled);
    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, Rejection::GroupFull.message());
}

#[tokio::test]
async fn test_server_refusal_reverts_optimistic_join() {
    let mock_server = MockServer::start().await;

    mount_group(&mock_server, 7, 1, None).await;
    mount_bookings(&mock_server, &[], None).await;
    Mock::given(method("POST"))
        .and(path(action("join", 7)))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "هذه المجموعة مكتملة"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _store) = client(&mock_server, Some("T1"), Some("R1"));
    let (flow, mut notices) = flow(&client);
    flow.load_group(7).await.unwrap();

    let err = flow.join(7).await.unwrap_err();

    assert!(err.api().is_some());
    assert_eq!(flow.membership(7), Membership::NotEnrolled);
    assert!(flow.enrolled().is_empty());
    assert_eq!(flow.group(7).unwrap().seats_left, 1);

    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, "هذه المجموعة مكتملة");
    assert!(!notice.retryable);
}

#[tokio::test]
async fn test_network_failure_on_leave_restores_membership() {
    let mock_server = MockServer::start().await;

    mount_group(&mock_server, 7, 2, None).await;
    mount_bookings(&mock_server, &[7], None).await;
    Mock::given(method("POST"))
        .and(path(action("leave", 7)))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let (client, _store) = client(&mock_server, Some("T1"), Some("R1"));
    let (flow, mut notices) = flow(&client);
    flow.load_group(7).await.unwrap();
    assert_eq!(flow.membership(7), Membership::Enrolled);

    let err = flow.leave(7).await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Network));
    assert_eq!(flow.membership(7), Membership::Enrolled);
    assert_eq!(flow.group(7).unwrap().seats_left, 2);
    assert!(!flow.is_busy());

    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.retryable);
}

#[tokio::test]
async fn test_join_leave_join_matches_server() {
    let mock_server = MockServer::start().await;

    mount_group(&mock_server, 7, 3, None).await;
    mount_bookings(&mock_server, &[], Some(1)).await;
    mount_bookings(&mock_server, &[7], Some(1)).await;
    mount_bookings(&mock_server, &[], Some(1)).await;
    mount_bookings(&mock_server, &[7], None).await;
    Mock::given(method("POST"))
        .and(path(action("join", 7)))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"message": JOINED})))
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(action("leave", 7)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": LEFT})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _store) = client(&mock_server, Some("T1"), Some("R1"));
    let (flow, mut notices) = flow(&client);
    flow.load_group(7).await.unwrap();

    flow.join(7).await.unwrap();
    flow.leave(7).await.unwrap();
    assert_eq!(flow.membership(7), Membership::NotEnrolled);
    flow.join(7).await.unwrap();

    let server_side = enrolled_groups(&client.bookings().list_mine().await.unwrap());
    assert_eq!(flow.enrolled(), server_side);

    let messages: Vec<String> = std::iter::from_fn(|| notices.try_recv().ok()).map(|n| n.message).collect();
    assert_eq!(messages, vec![JOINED, LEFT, JOINED]);
}

#[tokio::test]
async fn test_join_without_session_requires_login() {
    let mock_server = MockServer::start().await;

    let (client, _store) = client(&mock_server, None, None);
    let mut events = client.auth().subscribe();
    let (flow, mut notices) = flow(&client);

    let err = flow.join(7).await.unwrap_err();

    assert!(matches!(err, Error::Rejected(Rejection::LoginRequired)));
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::LoginRequired {
            redirect_to: "/login".to_string()
        }
    );
    assert_eq!(notices.try_recv().unwrap().message, "يجب تسجيل الدخول أولاً");
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_second_click_while_busy_is_ignored() {
    let mock_server = MockServer::start().await;

    mount_group(&mock_server, 7, 3, None).await;
    mount_bookings(&mock_server, &[], Some(1)).await;
    mount_bookings(&mock_server, &[7], None).await;
    Mock::given(method("POST"))
        .and(path(action("join", 7)))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"message": JOINED}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _store) = client(&mock_server, Some("T1"), Some("R1"));
    let (flow, mut notices) = flow(&client);
    flow.load_group(7).await.unwrap();

    let (first, second) = tokio::join!(flow.join(7), flow.join(7));

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(Error::Rejected(Rejection::Busy))))
            .count(),
        1
    );
    assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Success);
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn test_detached_view_drops_late_result() {
    let mock_server = MockServer::start().await;

    mount_group(&mock_server, 7, 3, None).await;
    Mock::given(method("GET"))
        .and(path("/api/bookings/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(action("join", 7)))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"message": JOINED}))
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&mock_server)
        .await;

    let (client, _store) = client(&mock_server, Some("T1"), Some("R1"));
    let (flow, mut notices) = flow(&client);
    flow.load_group(7).await.unwrap();

    let (result, _) = tokio::join!(flow.join(7), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        flow.detach();
    });

    assert!(result.is_ok());
    assert!(!flow.is_attached());
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn test_duplicate_join_is_a_conflict() {
    let mock_server = MockServer::start().await;

    mount_group(&mock_server, 7, 3, None).await;
    mount_bookings(&mock_server, &[], None).await;
    Mock::given(method("POST"))
        .and(path(action("join", 7)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "أنت بالفعل عضو في هذه المجموعة"})))
        .mount(&mock_server)
        .await;

    let (client, _store) = client(&mock_server, Some("T1"), Some("R1"));
    let (flow, mut notices) = flow(&client);
    flow.load_group(7).await.unwrap();

    let err = flow.join(7).await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Conflict));
    assert_eq!(flow.membership(7), Membership::NotEnrolled);
    assert_eq!(notices.try_recv().unwrap().message, "أنت بالفعل عضو في هذه المجموعة");
}

#[tokio::test]
async fn test_leave_when_not_enrolled_is_refused() {
    let mock_server = MockServer::start().await;

    mount_group(&mock_server, 7, 3, None).await;
    mount_bookings(&mock_server, &[], None).await;
    Mock::given(method("POST"))
        .and(path(action("leave", 7)))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (client, _store) = client(&mock_server, Some("T1"), Some("R1"));
    let (flow, _notices) = flow(&client);
    flow.load_group(7).await.unwrap();

    let err = flow.leave(7).await.unwrap_err();

    assert!(matches!(err, Error::Rejected(Rejection::NotEnrolled)));
    assert!(!flow.can_leave(7));
}

#[tokio::test]
async fn test_expired_session_during_join_rolls_back_quietly() {
    let mock_server = MockServer::start().await;

    mount_group(&mock_server, 7, 3, None).await;
    mount_bookings(&mock_server, &[], None).await;
    Mock::given(method("POST"))
        .and(path(action("join", 7)))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "token expired"})))
        .mount(&mock_server)
        .await;

    let (client, store) = client(&mock_server, Some("T1"), None);
    let (flow, mut notices) = flow(&client);
    flow.load_group(7).await.unwrap();

    let err = flow.join(7).await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::AuthExpired));
    assert!(flow.enrolled().is_empty());
    assert_eq!(store.get(ACCESS_KEY).unwrap(), None);
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn test_list_view_marks_joined_groups() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/groups/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "next": null,
            "previous": null,
            "results": [group_json(7, 3), group_json(8, 0)]
        })))
        .mount(&mock_server)
        .await;
    mount_bookings(&mock_server, &[7], None).await;

    let (client, _store) = client(&mock_server, Some("T1"), Some("R1"));
    let (flow, _notices) = flow(&client);

    let groups = flow.load_groups(&GroupFilter::new()).await.unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(flow.membership(7), Membership::Enrolled);
    assert_eq!(flow.membership(7).label(), "مسجل");
    assert_eq!(flow.membership(8), Membership::NotEnrolled);
    assert!(!flow.can_join(8));
    assert_eq!(flow.groups().len(), 2);
}

#[tokio::test]
async fn test_anonymous_list_view_has_no_memberships() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/groups/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([group_json(7, 3)])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bookings/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (client, _store) = client(&mock_server, None, None);
    let (flow, _notices) = flow(&client);

    flow.load_groups(&GroupFilter::new()).await.unwrap();

    assert_eq!(flow.membership(7), Membership::NotEnrolled);
    assert!(flow.can_join(7));
}

#[tokio::test]
async fn test_actions_wait_for_memberships() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/groups/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([group_json(3, 2), group_json(7, 4)])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bookings/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([booking_json(1, 3)]))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(action("join", 7)))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "هذه المجموعة مكتملة"})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (client, _store) = client(&mock_server, Some("T1"), Some("R1"));
    let (flow, mut notices) = flow(&client);
    assert!(!flow.can_join(7));

    let filter = GroupFilter::new();
    let (loaded, joined) = tokio::join!(flow.load_groups(&filter), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(flow.membership(7), Membership::Loading);
        assert!(!flow.can_join(7));
        flow.join(7).await
    });

    loaded.unwrap();
    assert!(matches!(joined, Err(Error::Rejected(Rejection::Loading))));
    assert_eq!(flow.membership(3), Membership::Enrolled);
    assert_eq!(flow.membership(7), Membership::NotEnrolled);
    assert!(flow.can_join(7));
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn test_join_stands_when_refetch_fails() {
    let mock_server = MockServer::start().await;

    mount_group(&mock_server, 7, 3, Some(1)).await;
    mount_bookings(&mock_server, &[], Some(1)).await;
    Mock::given(method("GET"))
        .and(path("/api/groups/7/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bookings/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(action("join", 7)))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"message": JOINED})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _store) = client(&mock_server, Some("T1"), Some("R1"));
    let (flow, mut notices) = flow(&client);
    flow.load_group(7).await.unwrap();

    flow.join(7).await.unwrap();

    assert_eq!(flow.membership(7), Membership::Enrolled);
    assert_eq!(flow.group(7).unwrap().seats_left, 3);
    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Success);
    assert_eq!(notice.message, JOINED);
    assert!(notices.try_recv().is_err());
}
