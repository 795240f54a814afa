//! Full login and report fetching against a mocked portal.

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use vtop::analysis::{outlook, DEFAULT_TARGET_PERCENT};
use vtop::captcha::encode_captcha_payload;
use vtop::client::paths;
use vtop::{
    MemorySessionStore, SessionStore, VtopClient, VtopConfig, VtopError, Weekday,
};

const CAPTCHA_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAAB";
const SEMESTER: &str = "VL20242505";

fn config(server: &ServerGuard) -> VtopConfig {
    VtopConfig {
        base_url: server.url(),
        captcha_solver_url: format!("{}/solve", server.url()),
        max_login_attempts: 4,
        max_captcha_setup_attempts: 3,
        retry_delay_ms: 0,
        ..VtopConfig::default()
    }
}

/// Mocks the landing page, prelogin setup, solver and a successful login.
async fn mock_login(server: &mut ServerGuard) -> Vec<mockito::Mock> {
    let landing = server
        .mock("GET", paths::LANDING)
        .with_status(200)
        .with_header("set-cookie", "JSESSIONID=first; Path=/vtop")
        .with_body(r#"<form><input type="hidden" name="_csrf" value="landing-token"/></form>"#)
        .create_async()
        .await;

    // Prelogin answers with a redirect, then the page holding the captcha
    let prelogin = server
        .mock("POST", paths::PRELOGIN_SETUP)
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("_csrf".into(), "landing-token".into()),
            Matcher::UrlEncoded("flag".into(), "VTOP".into()),
        ]))
        .with_status(302)
        .with_header("location", "/vtop/prelogin/captcha")
        .with_header("set-cookie", "JSESSIONID=second; Path=/vtop")
        .create_async()
        .await;
    let captcha_page = server
        .mock("GET", "/vtop/prelogin/captcha")
        .match_header("cookie", "JSESSIONID=second")
        .with_status(200)
        .with_body(format!(
            r#"<form id="vtopLoginForm" action="/vtop/doLogin" method="post">
                 <input type="hidden" name="_csrf" value="captcha-token"/>
                 <img src="{CAPTCHA_URI}"/>
                 <input type="text" name="captchaStr"/>
               </form>"#
        ))
        .create_async()
        .await;

    let solver = server
        .mock("POST", "/solve")
        .match_body(Matcher::Json(json!({
            "imgstring": encode_captcha_payload(CAPTCHA_URI)
        })))
        .with_status(200)
        .with_body("  K7PQ2 \n")
        .create_async()
        .await;

    let submit = server
        .mock("POST", "/vtop/doLogin")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("_csrf".into(), "captcha-token".into()),
            Matcher::UrlEncoded("username".into(), "21BCE0001".into()),
            Matcher::UrlEncoded("password".into(), "p@ss word".into()),
            Matcher::UrlEncoded("captchaStr".into(), "K7PQ2".into()),
        ]))
        .with_status(200)
        .with_header("set-cookie", "SERVERID=node3; Path=/")
        .with_body(
            r#"<nav>Academics</nav>
               <input type="hidden" name="authorizedID" id="authorizedID" value="21BCE0001"/>
               <input type="hidden" name="_csrf" value="session-token"/>"#,
        )
        .expect(1)
        .create_async()
        .await;

    vec![landing, prelogin, captcha_page, solver, submit]
}

#[tokio::test]
async fn test_login_then_fetch_reports() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;

    let report_fields = Matcher::AllOf(vec![
        Matcher::UrlEncoded("_csrf".into(), "session-token".into()),
        Matcher::UrlEncoded("authorizedID".into(), "21BCE0001".into()),
    ]);

    let semesters = server
        .mock("POST", paths::SEMESTERS)
        .match_header("cookie", "JSESSIONID=second; SERVERID=node3")
        .match_body(report_fields.clone())
        .with_status(200)
        .with_body(
            r#"<select id="semesterSubId">
                 <option value="">-- Choose Semester --</option>
                 <option value="VL20242505">Winter Semester 2024-25 - VLR</option>
               </select>"#,
        )
        .create_async()
        .await;

    let timetable = server
        .mock("POST", paths::TIMETABLE)
        .match_body(Matcher::AllOf(vec![
            report_fields.clone(),
            Matcher::UrlEncoded("semesterSubId".into(), SEMESTER.into()),
        ]))
        .with_status(200)
        .with_body(
            r#"<table>
                 <tr><td>1</td><td>CSE2005 - Operating Systems ( Embedded Theory )</td>
                     <td>A1 - SJT502</td><td>ANANYA RAO - SCOPE</td></tr>
               </table>
               <table>
                 <tr><td>THEORY</td><td>Start</td><td>08:00</td></tr>
                 <tr><td>End</td><td>08:50</td></tr>
                 <tr><td>WED</td><td>THEORY</td><td>A1-CSE2005-ETH-SJT502-SJT-ALL</td></tr>
               </table>"#,
        )
        .create_async()
        .await;

    let attendance = server
        .mock("POST", paths::ATTENDANCE)
        .match_body(Matcher::UrlEncoded("semesterSubId".into(), SEMESTER.into()))
        .with_status(200)
        .with_body(
            r#"<table>
                 <tr><td>1</td><td>Embedded Theory</td><td>Operating Systems</td><td>CSE2005</td>
                     <td>ANANYA RAO - SCOPE</td><td>20</td><td>40</td><td>50%</td></tr>
               </table>"#,
        )
        .create_async()
        .await;

    let mut client = VtopClient::new(config(&server)).unwrap();
    let saved = client.login("21BCE0001", "p@ss word").await.unwrap();
    assert_eq!(saved.subject_id, "21BCE0001");
    assert_eq!(saved.csrf_token, "session-token");
    assert_eq!(saved.cookie_header, "JSESSIONID=second; SERVERID=node3");

    let fetched = client.fetch_semesters().await.unwrap();
    assert_eq!(fetched.semester_id, None);
    assert_eq!(fetched.data.len(), 1);
    assert_eq!(fetched.data[0].display_name, "Winter Semester 2024-25");

    let fetched = client.fetch_timetable(SEMESTER).await.unwrap();
    assert_eq!(fetched.semester_id.as_deref(), Some(SEMESTER));
    assert_eq!(fetched.data.len(), 1);
    let slot = &fetched.data[0];
    assert_eq!(slot.day, Weekday::Wednesday);
    assert_eq!(slot.course_name, "Operating Systems");
    assert_eq!(slot.start_time.as_deref(), Some("08:00"));
    assert_eq!(slot.end_time.as_deref(), Some("08:50"));

    let fetched = client.fetch_attendance(SEMESTER).await.unwrap();
    assert_eq!(fetched.incomplete, None);
    let plan = outlook(&fetched.data, DEFAULT_TARGET_PERCENT);
    assert_eq!(plan[0].classes_needed, Some(40));

    semesters.assert_async().await;
    timetable.assert_async().await;
    attendance.assert_async().await;
}

#[tokio::test]
async fn test_expired_stored_session_falls_back_to_login() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let store = MemorySessionStore::with_default_ttl();
    store.save(
        "21BCE0001",
        vtop::SavedSession {
            cookie_header: "JSESSIONID=stale".to_string(),
            csrf_token: "stale-token".to_string(),
            subject_id: "21BCE0001".to_string(),
        },
    );

    let _expired = server
        .mock("POST", paths::MARKS)
        .match_header("cookie", "JSESSIONID=stale")
        .with_status(200)
        .with_body(r#"<div id="page-wrapper"><a href="/vtop/login">Sign in</a></div>"#)
        .create_async()
        .await;
    let marks = server
        .mock("POST", paths::MARKS)
        .match_header("cookie", "JSESSIONID=second; SERVERID=node3")
        .with_status(200)
        .with_body("<table></table>")
        .expect(1)
        .create_async()
        .await;

    let mut client = VtopClient::new(config(&server)).unwrap();
    client
        .ensure_session(&store, "21BCE0001", "p@ss word")
        .await
        .unwrap();

    let err = client.fetch_marks(SEMESTER).await.unwrap_err();
    assert_eq!(err, VtopError::SessionExpired);
    assert!(err.needs_reauth());

    store.invalidate("21BCE0001");
    let fresh = client
        .ensure_session(&store, "21BCE0001", "p@ss word")
        .await
        .unwrap();
    assert_eq!(fresh.csrf_token, "session-token");
    assert_eq!(store.load("21BCE0001"), Some(fresh));

    let fetched = client.fetch_marks(SEMESTER).await.unwrap();
    assert!(fetched.data.is_empty());
    marks.assert_async().await;
}
