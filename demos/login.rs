use std::{io::Write, sync::Arc};

use tunegate::{
    auth::PkceAuthenticator,
    config::SpotifyConfig,
    guard::NavigationGuard,
    router::{Route, Router},
    storage::FileStorage,
};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = SpotifyConfig::from_env().expect("failed to read Spotify configuration from the environment");
    let storage = Arc::new(FileStorage::new("session.json"));
    let authenticator = PkceAuthenticator::new(config, Arc::clone(&storage));
    let router = Router::new(NavigationGuard::new(authenticator.clone(), storage));

    let navigation = router.push("/").await.expect("failed to navigate home");

    if navigation.route == Route::Login {
        let authorize_url = authenticator.authorize_url().expect("failed to build authorize URL");
        println!("Authorize URL: {authorize_url}");

        print!("Callback URL: ");
        std::io::stdout().flush().unwrap();

        let mut callback_url = String::new();
        std::io::stdin().read_line(&mut callback_url).unwrap();

        let callback_url = callback_url.trim();
        let callback = url::Url::parse(callback_url).expect("invalid callback URL");
        let callback_path = format!("{}?{}", callback.path(), callback.query().unwrap_or_default());

        // the front-end lands on the callback route first, then completes the authorization
        router
            .push(&callback_path)
            .await
            .expect("failed to navigate to the callback");

        authenticator
            .handle_callback_url(callback_url)
            .await
            .expect("failed to complete authorization");
    }

    let navigation = router.push("/explore").await.expect("failed to navigate");
    println!("Now at {} ({})", navigation.route, navigation.route.name());
}
