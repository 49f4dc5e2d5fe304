//! Sign-up, sign-in and session commands

use huddle_core::Accounts;
use tracing::info;

use crate::cli::Credentials;
use crate::error::AppResult;
use crate::state::AppState;

pub fn register(state: &AppState, creds: &Credentials) -> AppResult<()> {
    let signed = {
        let db = state.db();
        Accounts::new(&*db).sign_up(&creds.username, &creds.password)?
    };
    state.remember_session(signed.session.id)?;
    info!(user_id = %signed.user.id, "Registered");
    println!("Welcome, {}!", signed.user.username);
    Ok(())
}

pub fn login(state: &AppState, creds: &Credentials) -> AppResult<()> {
    let signed = {
        let db = state.db();
        Accounts::new(&*db).sign_in(&creds.username, &creds.password)?
    };
    state.remember_session(signed.session.id)?;
    println!("Signed in as {}", signed.user.username);
    Ok(())
}

pub fn logout(state: &AppState) -> AppResult<()> {
    if let Some(session_id) = state.current_session_id()? {
        let db = state.db();
        Accounts::new(&*db).sign_out(session_id)?;
    }
    state.forget_session()?;
    println!("Signed out");
    Ok(())
}

pub fn whoami(state: &AppState) -> AppResult<()> {
    let user = state.require_user()?;
    println!("{} ({})", user.username, user.id);
    Ok(())
}
