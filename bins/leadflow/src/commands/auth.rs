//! login / logout / token

use super::Context;
use anyhow::Result;
use leadflow_api_client::TokenPair;
use owo_colors::OwoColorize;
use serde_json::json;

/// Store a token pair issued by the login flow
pub fn login(ctx: &Context, access_token: String, refresh_token: String) -> Result<()> {
    if access_token.trim().is_empty() || refresh_token.trim().is_empty() {
        anyhow::bail!("access and refresh tokens must not be empty");
    }

    ctx.client.login(TokenPair::new(access_token, refresh_token));

    if ctx.json {
        println!("{}", json!({ "authenticated": true }));
    } else {
        println!("{} Credentials stored", "✓".green());
    }
    Ok(())
}

/// Forget stored credentials
pub fn logout(ctx: &Context) -> Result<()> {
    ctx.client.logout();

    if ctx.json {
        println!("{}", json!({ "authenticated": false }));
    } else {
        println!("{} Logged out", "✓".green());
    }
    Ok(())
}

/// Report whether an access token is available, without revealing it
pub fn status(ctx: &Context) -> Result<()> {
    let authenticated = ctx.client.auth().is_authenticated();

    if ctx.json {
        println!("{}", json!({ "authenticated": authenticated }));
    } else if authenticated {
        println!("{} Access token stored", "✓".green());
    } else {
        println!("{} No credentials stored", "✗".yellow());
    }
    Ok(())
}
