mod common;

use axum::http::StatusCode;

use cluebook::config::{Environment, ServerConfig};
use cluebook::store::Store;
use cluebook::store::reconcile::NO_VALID_CLUES;
use cluebook::types::Quantity;
use common::{TestApp, json_body, location, messages};

fn id_from_location(location: &str) -> i64 {
    location
        .trim_start_matches("/mysteries/")
        .parse()
        .expect("mystery id in location")
}

#[tokio::test]
async fn test_health() {
    let mut app = TestApp::new();
    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_visit_creates_no_session() {
    let mut app = TestApp::new();
    let response = app.get("/login").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!app.has_cookie());
}

#[tokio::test]
async fn test_home_prompts_login_when_signed_out() {
    let mut app = TestApp::new();
    let view = json_body(app.get("/").await).await;

    assert_eq!(view["view"], "index");
    assert_eq!(view["data"]["promptLogin"], true);
    assert_eq!(view["viewer"]["signedIn"], false);
    assert!(messages(&view).contains(&"You must be signed in to view mysteries.".to_string()));
}

#[tokio::test]
async fn test_protected_page_remembers_return_to() {
    let mut app = TestApp::new();
    app.seed_user("holmes", false);

    let response = app.get("/mysteries/new").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let view = json_body(app.get("/login").await).await;
    assert!(messages(&view).contains(&"You must be signed in to view this page.".to_string()));

    let login = app.login("holmes").await;
    assert_eq!(login["success"], true);
    assert_eq!(login["redirectUrl"], "/mysteries/new");

    let response = app.get("/mysteries/new").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_failures() {
    let mut app = TestApp::new();
    app.seed_user("holmes", false);

    let response = app.post("/login", "username=moriarty&password=x").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "No user found with the given username.");

    let response = app.post("/login", "username=holmes&password=wrong+horse").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Invalid password. Please try again.");
    assert!(body.get("success").is_none());
}

#[tokio::test]
async fn test_register_signs_in_and_rejects_duplicates() {
    let mut app = TestApp::new();

    let response = app
        .post("/register", "username=watson&password=elementary1")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let view = json_body(app.get("/").await).await;
    assert_eq!(view["viewer"]["signedIn"], true);
    assert_eq!(view["viewer"]["username"], "watson");
    assert_eq!(view["viewer"]["isAdmin"], false);
    assert!(messages(&view).contains(&"Registration successful".to_string()));

    let mut other = app.fresh_client();
    let response = other
        .post("/register", "username=watson&password=elementary2")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let view = json_body(response).await;
    assert_eq!(view["view"], "register");
    assert_eq!(view["data"]["username"], "watson");
    assert!(
        messages(&view).contains(&"Username already taken, please choose another one.".to_string())
    );
}

#[tokio::test]
async fn test_admin_signup_requires_configured_code() {
    let config = ServerConfig {
        admin_signup_code: Some("baker-street".to_string()),
        ..ServerConfig::default()
    };
    let mut app = TestApp::with_config(config);

    app.post(
        "/register",
        "username=lestrade&password=elementary1&adminPassword=guess",
    )
    .await;
    let mut other = app.fresh_client();
    other
        .post(
            "/register",
            "username=mycroft&password=elementary1&adminPassword=baker-street",
        )
        .await;

    let lestrade = app.store.get_user_by_username("lestrade").unwrap().unwrap();
    let mycroft = app.store.get_user_by_username("mycroft").unwrap().unwrap();
    assert!(!lestrade.is_admin);
    assert!(mycroft.is_admin);
}

#[tokio::test]
async fn test_create_mystery_with_clues() {
    let mut app = TestApp::new();
    app.seed_user("holmes", false);
    let rope = app.seed_clue("Rope");
    let knife = app.seed_clue("Knife");
    app.login("holmes").await;

    let form = format!(
        "title=The+Library&description=Colonel+Mustard\
         &clues[{r}][id]={r}&clues[{r}][checked]=true&clues[{r}][quantity]=2\
         &clues[{k}][id]={k}&clues[{k}][quantity]=1",
        r = rope.id,
        k = knife.id
    );
    let response = app.post("/mysteries", &form).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let id = id_from_location(location(&response));

    let view = json_body(app.get(&format!("/mysteries/{id}")).await).await;
    assert_eq!(view["view"], "mystery");
    assert_eq!(view["data"]["mystery"]["title"], "The Library");
    assert_eq!(view["data"]["canDelete"], true);
    let clues = view["data"]["mystery"]["clues"].as_array().unwrap();
    assert_eq!(clues.len(), 1);
    assert_eq!(clues[0]["name"], "Rope");
    assert_eq!(clues[0]["quantity"], "2");
    assert!(messages(&view).contains(&"Mystery added successfully.".to_string()));
}

#[tokio::test]
async fn test_create_without_valid_clues_writes_nothing() {
    let mut app = TestApp::new();
    app.seed_user("holmes", false);
    let rope = app.seed_clue("Rope");
    let knife = app.seed_clue("Knife");
    app.login("holmes").await;

    let form = format!(
        "title=The+Empty+Room&description=Nothing+here%21\
         &clues[{r}][id]={r}&clues[{r}][checked]=true&clues[{r}][quantity]=0\
         &clues[{k}][id]={k}&clues[{k}][quantity]=3",
        r = rope.id,
        k = knife.id
    );
    let response = app.post("/mysteries", &form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let view = json_body(response).await;
    assert_eq!(view["view"], "new-mystery");
    assert_eq!(view["data"]["title"], "The Empty Room");
    assert_eq!(view["data"]["description"], "Nothing here!");
    assert_eq!(view["data"]["clues"].as_array().unwrap().len(), 2);
    assert!(messages(&view).contains(&NO_VALID_CLUES.to_string()));

    assert_eq!(app.store.count_mysteries().unwrap(), 0);
}

#[tokio::test]
async fn test_home_pagination() {
    let mut app = TestApp::new();
    let holmes = app.seed_user("holmes", false);
    let rope = app.seed_clue("Rope");
    for n in 1..=12 {
        app.seed_mystery(&format!("Case {n:02}"), &holmes, &rope);
    }
    app.login("holmes").await;

    let view = json_body(app.get("/?page=3").await).await;
    assert_eq!(view["data"]["mysteries"].as_array().unwrap().len(), 2);
    assert_eq!(view["data"]["page"]["totalPages"], 3);
    assert_eq!(view["data"]["page"]["current"], 3);
    assert_eq!(view["data"]["mysteries"][0]["title"], "Case 11");

    let response = app.get("/?page=4").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let view = json_body(response).await;
    assert_eq!(view["view"], "error");
    assert_eq!(view["data"]["message"], "Page number exceeds available pages.");

    for bad in ["0", "-1", "abc"] {
        let response = app.get(&format!("/?page={bad}")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "page={bad}");
    }
}

#[tokio::test]
async fn test_add_clue_twice_updates_quantity() {
    let mut app = TestApp::new();
    let holmes = app.seed_user("holmes", false);
    let rope = app.seed_clue("Rope");
    let knife = app.seed_clue("Knife");
    let id = app.seed_mystery("The Study", &holmes, &rope);
    app.login("holmes").await;

    let url = format!("/mysteries/{id}/add-clue");
    let response = app
        .post(&url, &format!("newClue[id]={}&newClue[quantity]=3", knife.id))
        .await;
    assert_eq!(location(&response), format!("/mysteries/{id}/edit"));

    app.post(
        &url,
        &format!("newClue[id]={}&newClue[quantity]=a+pinch", knife.id),
    )
    .await;
    let view = json_body(app.get(&format!("/mysteries/{id}/edit")).await).await;
    assert!(messages(&view).contains(&"Clue quantity updated.".to_string()));

    let mystery = app.store.get_mystery_with_clues(id).unwrap().unwrap();
    assert_eq!(mystery.clues.len(), 2);
    let knife_entry = mystery
        .clues
        .iter()
        .find(|c| c.clue_id == knife.id)
        .unwrap();
    assert_eq!(knife_entry.quantity, Quantity::Label("a pinch".to_string()));

    app.post(&url, &format!("newClue[id]={}&newClue[quantity]=-2", knife.id))
        .await;
    let view = json_body(app.get(&format!("/mysteries/{id}/edit")).await).await;
    assert!(messages(&view).contains(
        &"Quantity must be greater than zero if it is a numeric value.".to_string()
    ));
}

#[tokio::test]
async fn test_deferred_clue_is_saved_with_edit() {
    let mut app = TestApp::new();
    let holmes = app.seed_user("holmes", false);
    let rope = app.seed_clue("Rope");
    let knife = app.seed_clue("Knife");
    let id = app.seed_mystery("The Study", &holmes, &rope);
    app.login("holmes").await;

    app.post(
        &format!("/mysteries/{id}/add-clue"),
        &format!("newClue[id]={}&newClue[quantity]=2&defer=true", knife.id),
    )
    .await;
    assert_eq!(app.session().pending_clues[&id].len(), 1);
    assert_eq!(
        app.store.get_mystery_with_clues(id).unwrap().unwrap().clues.len(),
        1
    );

    let view = json_body(app.get(&format!("/mysteries/{id}/edit")).await).await;
    assert_eq!(view["data"]["pendingClues"][0]["name"], "Knife");

    let form = format!(
        "title=The+Quiet+Study&description=Updated&clues[0][id]={}&clues[0][quantity]=5",
        rope.id
    );
    let response = app.post(&format!("/mysteries/{id}/edit"), &form).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/mysteries/{id}"));

    let mystery = app.store.get_mystery_with_clues(id).unwrap().unwrap();
    assert_eq!(mystery.mystery.title, "The Quiet Study");
    assert_eq!(mystery.clues.len(), 2);
    let rope_entry = mystery.clues.iter().find(|c| c.clue_id == rope.id).unwrap();
    assert_eq!(rope_entry.quantity.to_string(), "5");
    assert!(app.session().pending_clues.is_empty());
}

#[tokio::test]
async fn test_missing_staged_clue_does_not_block_edits() {
    let mut app = TestApp::new();
    let holmes = app.seed_user("holmes", false);
    let rope = app.seed_clue("Rope");
    let knife = app.seed_clue("Knife");
    let id = app.seed_mystery("The Study", &holmes, &rope);
    app.login("holmes").await;
    let add_url = format!("/mysteries/{id}/add-clue");

    app.post(&add_url, "newClue[id]=9999&newClue[quantity]=1&defer=true")
        .await;
    assert!(!app.session().pending_clues.contains_key(&id));
    let view = json_body(app.get(&format!("/mysteries/{id}/edit")).await).await;
    assert!(messages(&view).contains(&"Invalid clue or quantity provided.".to_string()));

    // A clue deleted after it was staged is skipped on save.
    app.post(
        &add_url,
        &format!("newClue[id]={}&newClue[quantity]=2&defer=true", knife.id),
    )
    .await;
    assert!(app.store.delete_clue(knife.id).unwrap());

    let form = format!(
        "title=The+Quiet+Study&description=Updated&clues[0][id]={}&clues[0][quantity]=4",
        rope.id
    );
    let response = app.post(&format!("/mysteries/{id}/edit"), &form).await;
    assert_eq!(location(&response), format!("/mysteries/{id}"));

    let mystery = app.store.get_mystery_with_clues(id).unwrap().unwrap();
    assert_eq!(mystery.mystery.title, "The Quiet Study");
    assert_eq!(mystery.clues.len(), 1);
    assert!(app.session().pending_clues.is_empty());

    let view = json_body(app.get(&format!("/mysteries/{id}")).await).await;
    let shown = messages(&view);
    assert!(shown.contains(&"Invalid clue or quantity provided.".to_string()));
    assert!(shown.contains(&"Mystery updated successfully.".to_string()));
}

#[tokio::test]
async fn test_create_warns_about_rejected_clue_next_to_valid_one() {
    let mut app = TestApp::new();
    app.seed_user("holmes", false);
    let rope = app.seed_clue("Rope");
    let knife = app.seed_clue("Knife");
    app.login("holmes").await;

    let form = format!(
        "title=The+Cellar&description=Damp\
         &clues[{r}][id]={r}&clues[{r}][checked]=true&clues[{r}][quantity]=2\
         &clues[{k}][id]={k}&clues[{k}][checked]=true&clues[{k}][quantity]=0",
        r = rope.id,
        k = knife.id
    );
    let response = app.post("/mysteries", &form).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let id = id_from_location(location(&response));

    let view = json_body(app.get(&format!("/mysteries/{id}")).await).await;
    let shown = messages(&view);
    assert!(shown.contains(&"Invalid clue or quantity provided.".to_string()));
    assert!(shown.contains(&"Mystery added successfully.".to_string()));
    let clues = view["data"]["mystery"]["clues"].as_array().unwrap();
    assert_eq!(clues.len(), 1);
    assert_eq!(clues[0]["name"], "Rope");
}

#[tokio::test]
async fn test_edit_bad_ids() {
    let mut app = TestApp::new();
    app.seed_user("holmes", false);
    app.login("holmes").await;

    let response = app.get("/mysteries/abc/edit").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/mysteries/999/edit").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .post("/mysteries/999/edit", "title=Ghost&description=none")
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_clues() {
    let mut app = TestApp::new();
    let holmes = app.seed_user("holmes", false);
    let rope = app.seed_clue("Rope");
    let knife = app.seed_clue("Knife");
    let id = app.seed_mystery("The Study", &holmes, &rope);
    app.store
        .upsert_mystery_clue(id, knife.id, &Quantity::Numeric(1.0))
        .unwrap();
    app.login("holmes").await;

    let response = app
        .post(&format!("/mysteries/{id}/remove-clue"), "other=1")
        .await;
    assert_eq!(location(&response), format!("/mysteries/{id}/remove-clues"));
    let view = json_body(app.get(&format!("/mysteries/{id}/remove-clues")).await).await;
    assert!(messages(&view).contains(&"No clues were selected to remove.".to_string()));

    let form = format!("cluesToRemove[]={}&cluesToRemove[]={}", rope.id, knife.id);
    app.post(&format!("/mysteries/{id}/remove-clue"), &form).await;
    let view = json_body(app.get(&format!("/mysteries/{id}/remove-clues")).await).await;
    assert_eq!(view["view"], "delete-clues");
    assert!(messages(&view).contains(&"Selected clues removed successfully.".to_string()));
    assert!(view["data"]["mystery"]["clues"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_requires_author_or_admin() {
    let mut app = TestApp::new();
    let holmes = app.seed_user("holmes", false);
    app.seed_user("watson", false);
    app.seed_user("hudson", true);
    let rope = app.seed_clue("Rope");
    let first = app.seed_mystery("First", &holmes, &rope);
    let second = app.seed_mystery("Second", &holmes, &rope);

    let mut watson = app.fresh_client();
    watson.login("watson").await;
    let response = watson
        .post(&format!("/mysteries/{first}/delete"), "")
        .await;
    assert_eq!(location(&response), format!("/mysteries/{first}"));
    assert!(app.store.get_mystery(first).unwrap().is_some());

    app.login("holmes").await;
    let response = app.post(&format!("/mysteries/{first}/delete"), "").await;
    assert_eq!(location(&response), "/");
    assert!(app.store.get_mystery(first).unwrap().is_none());

    let mut hudson = app.fresh_client();
    hudson.login("hudson").await;
    hudson
        .post(&format!("/mysteries/{second}/delete"), "")
        .await;
    assert!(app.store.get_mystery(second).unwrap().is_none());
}

#[tokio::test]
async fn test_manage_clues_is_admin_only() {
    let mut app = TestApp::new();
    app.seed_user("watson", false);

    let response = app.get("/clues/manage").await;
    assert_eq!(location(&response), "/login");

    app.login("watson").await;
    let response = app.get("/clues/manage").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let view = json_body(response).await;
    assert_eq!(
        view["data"]["message"],
        "You do not have permission to access the Manage Clues page."
    );
}

#[tokio::test]
async fn test_admin_clue_management() {
    let mut app = TestApp::new();
    app.seed_user("hudson", true);
    app.login("hudson").await;

    let response = app.post("/clues/add", "name=+Dagger+").await;
    assert_eq!(location(&response), "/clues/manage");
    let view = json_body(app.get("/clues/manage").await).await;
    assert!(messages(&view).contains(&"Clue added successfully.".to_string()));
    assert_eq!(view["data"]["clues"][0]["name"], "Dagger");
    let dagger_id = view["data"]["clues"][0]["id"].as_i64().unwrap();

    app.post("/clues/add", "name=Dagger").await;
    let view = json_body(app.get("/clues/manage").await).await;
    assert!(messages(&view).contains(&"Failed to add clue. It may already exist.".to_string()));

    app.post("/clues/add", "name=+++").await;
    let view = json_body(app.get("/clues/manage").await).await;
    assert!(messages(&view).contains(&"Clue name is required.".to_string()));

    let view = json_body(app.get(&format!("/clues/{dagger_id}/edit")).await).await;
    assert_eq!(view["view"], "edit-clue");

    app.post(&format!("/clues/{dagger_id}/edit"), "name=Revolver")
        .await;
    assert_eq!(app.store.get_clue(dagger_id).unwrap().unwrap().name, "Revolver");

    app.post(&format!("/clues/{dagger_id}/delete"), "").await;
    let view = json_body(app.get("/clues/manage").await).await;
    assert!(messages(&view).contains(&"Clue deleted successfully.".to_string()));
    assert!(app.store.get_clue(dagger_id).unwrap().is_none());

    let response = app.get("/clues/manage?page=2").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search() {
    let mut app = TestApp::new();
    let holmes = app.seed_user("holmes", false);
    let rope = app.seed_clue("Rope");
    let knife = app.seed_clue("Knife");
    app.seed_mystery("Library", &holmes, &rope);
    app.seed_mystery("Kitchen", &holmes, &knife);
    app.login("holmes").await;

    let view = json_body(app.get("/search?searchType=mysteriesByClue&query=ROPE").await).await;
    assert_eq!(view["view"], "search-results");
    assert_eq!(view["data"]["results"].as_array().unwrap().len(), 1);
    assert_eq!(view["data"]["results"][0]["title"], "Library");

    let view = json_body(app.get("/search?query=kit").await).await;
    assert_eq!(view["data"]["searchType"], "mysteries");
    assert_eq!(view["data"]["results"][0]["title"], "Kitchen");

    let view = json_body(app.get("/search?searchType=clues&query=kni").await).await;
    assert_eq!(view["data"]["results"][0]["name"], "Knife");

    let view = json_body(app.get("/search?query=%25").await).await;
    assert!(view["data"]["results"].as_array().unwrap().is_empty());

    let response = app.get("/search?searchType=bogus&query=x").await;
    assert_eq!(location(&response), "/");
    let view = json_body(app.get("/").await).await;
    assert!(messages(&view).contains(&"Invalid search type selected.".to_string()));
}

#[tokio::test]
async fn test_minigame_win() {
    let mut app = TestApp::new();

    let view = json_body(app.get("/minigames").await).await;
    assert_eq!(view["view"], "games/hacking");
    assert_eq!(view["data"]["attemptsLeft"], 5);
    assert!(view["data"].get("correctWord").is_none());

    let target = app.session().game.unwrap().target;

    let response = app.post("/minigames/guess", "guess=zzzzz").await;
    assert_eq!(location(&response), "/minigames");

    let response = app.post("/minigames/guess", &format!("guess={target}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let view = json_body(response).await;
    assert_eq!(view["view"], "win");
    assert_eq!(view["data"]["correctWord"], target);
}

#[tokio::test]
async fn test_minigame_loses_after_five_misses_and_resets() {
    let mut app = TestApp::new();
    app.get("/minigames").await;

    for _ in 0..4 {
        let response = app.post("/minigames/guess", "guess=zzzzz").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
    let response = app.post("/minigames/guess", "guess=zzzzz").await;
    let view = json_body(response).await;
    assert_eq!(view["view"], "lose");
    assert_eq!(view["data"]["outcome"], "lost");

    let view = json_body(app.get("/minigames?reset=1").await).await;
    assert_eq!(view["data"]["attemptsLeft"], 5);
    assert_eq!(view["data"]["outcome"], "in_progress");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let mut app = TestApp::new();
    app.seed_user("holmes", false);
    app.login("holmes").await;
    assert!(app.has_cookie());

    let response = app.post("/logout", "").await;
    assert_eq!(location(&response), "/login");
    assert!(!app.has_cookie());

    let response = app.get("/mysteries/new").await;
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_error_detail_only_in_development() {
    let mut app = TestApp::new();
    let response = app.post("/login", "username=%ff").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let view = json_body(response).await;
    assert_eq!(view["data"]["message"], "Malformed form data.");
    assert!(view["data"]["error"].get("detail").is_none());

    let config = ServerConfig {
        environment: Environment::Development,
        ..ServerConfig::default()
    };
    let mut app = TestApp::with_config(config);
    let view = json_body(app.post("/login", "username=%ff").await).await;
    assert!(view["data"]["error"]["detail"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let mut app = TestApp::new();
    let response = app.get("/nowhere").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let view = json_body(response).await;
    assert_eq!(view["view"], "error");
}
