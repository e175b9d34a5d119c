use std::error::Error;
use log::{ debug, info };
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader };

use crate::app::AppContext;
use crate::error::SaveState;
use crate::models::profile::{ OnboardingData, UserProfile };
use crate::models::saved::SavedItem;

type ReplResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

const HELP: &str =
    "Commands: /save N, /saved, /unsave ID, /clear-saved, /history, /clear-history, /theme, /profile, /onboard key=value..., /signout, /quit";

#[derive(Debug, PartialEq)]
enum Command {
    Ask(String),
    Save(usize),
    Saved,
    Unsave(String),
    ClearSaved,
    History,
    ClearHistory,
    Theme,
    Profile,
    Onboard(OnboardingData),
    SignOut,
    Help,
    Quit,
    Invalid(String),
}

fn parse(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Command::Ask(line.to_string()));
    }

    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (line, ""),
    };
    let cmd = match (name, arg) {
        ("/save", n) =>
            match n.parse::<usize>() {
                Ok(n) if n > 0 => Command::Save(n),
                _ => Command::Invalid("usage: /save N (card number from the last reply)".into()),
            }
        ("/unsave", "") => Command::Invalid("usage: /unsave ID".into()),
        ("/unsave", id) => Command::Unsave(id.to_string()),
        ("/saved", _) => Command::Saved,
        ("/clear-saved", _) => Command::ClearSaved,
        ("/history", _) => Command::History,
        ("/clear-history", _) => Command::ClearHistory,
        ("/theme", _) => Command::Theme,
        ("/profile", _) => Command::Profile,
        ("/onboard", answers) =>
            match parse_onboarding(answers) {
                Ok(data) => Command::Onboard(data),
                Err(msg) => Command::Invalid(msg),
            }
        ("/signout", _) => Command::SignOut,
        ("/help", _) => Command::Help,
        ("/quit", _) | ("/exit", _) => Command::Quit,
        (other, _) => Command::Invalid(format!("unknown command {}", other)),
    };
    Some(cmd)
}

/// Reads `key=value` answers; list answers are comma separated.
fn parse_onboarding(answers: &str) -> Result<OnboardingData, String> {
    let mut data = OnboardingData::default();
    let list = |v: &str| -> Vec<String> {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };
    for answer in answers.split_whitespace() {
        let Some((key, value)) = answer.split_once('=') else {
            return Err(format!("expected key=value, got '{}'", answer));
        };
        match key {
            "type" => {
                data.user_type = Some(value.parse()?);
            }
            "name" => {
                data.full_name = value.to_string();
            }
            "country" => {
                data.country_of_origin = value.to_string();
            }
            "stay" => {
                data.duration_of_stay = value.to_string();
            }
            "unit" => {
                data.duration_unit = value.parse()?;
            }
            "language" => {
                data.preferred_language = value.to_string();
            }
            "interests" => {
                data.interests = list(value);
            }
            "accommodation" => {
                data.accommodation_preferences = list(value);
            }
            "activities" => {
                data.activity_preferences = list(value);
            }
            "food" => {
                data.food_preferences = list(value);
            }
            "budget" => {
                data.budget_range = value.to_string();
            }
            "style" => {
                data.travel_style = list(value);
            }
            other => {
                return Err(format!("unknown onboarding answer '{}'", other));
            }
        }
    }
    Ok(data)
}

fn describe_profile(profile: &UserProfile) -> String {
    let status = if profile.onboarding_completed { "completed" } else { "pending" };
    let mut text = format!("{} (onboarding {})", profile.email, status);
    if let Some(user_type) = profile.user_type {
        text.push_str(&format!("\n type: {:?}", user_type));
    }
    if !profile.interests.is_empty() {
        text.push_str(&format!("\n interests: {}", profile.interests.join(", ")));
    }
    text
}

fn describe(item: &SavedItem) -> String {
    let mut line = format!("{} [{}]", item.title, item.id);
    if !item.category.is_empty() {
        line.push_str(&format!(" ({})", item.category));
    }
    if let Some(rating) = item.rating {
        line.push_str(&format!(" {:.1}*", rating));
    }
    line
}

/// Line-oriented front-end over stdin/stdout.
pub async fn run(app: &AppContext) -> ReplResult<()> {
    let input = BufReader::new(tokio::io::stdin());
    let output = tokio::io::stdout();
    run_with(app, input, output).await
}

pub async fn run_with<R, W>(app: &AppContext, input: R, mut out: W) -> ReplResult<()>
    where R: AsyncBufRead + Unpin, W: AsyncWrite + Unpin
{
    let mut lines = input.lines();
    let mut last_cards: Vec<SavedItem> = Vec::new();

    out.write_all(format!("Karibu! Ask about Diani Beach. {}\n", HELP).as_bytes()).await?;
    out.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let Some(cmd) = parse(&line) else {
            continue;
        };
        debug!("REPL command: {:?}", cmd);

        let text = match cmd {
            Command::Quit => {
                break;
            }
            Command::Ask(query) => {
                match app.concierge.send(&query).await {
                    Some(reply) => {
                        let mut text = reply.text.clone();
                        for (i, card) in reply.cards.iter().enumerate() {
                            let mark = if app.saved_items.is_saved(&card.id).await { "*" } else { " " };
                            text.push_str(&format!("\n {}{}. {}", mark, i + 1, describe(card)));
                        }
                        for suggestion in &reply.suggestions {
                            text.push_str(&format!("\n  > {}", suggestion.text));
                        }
                        last_cards = reply.cards;
                        text
                    }
                    None => continue,
                }
            }
            Command::Save(n) =>
                match last_cards.get(n - 1) {
                    Some(card) =>
                        match app.saved_items.toggle_save(card).await {
                            Ok(SaveState::Saved) => format!("Saved {}", card.title),
                            Ok(SaveState::Removed) => format!("Removed {}", card.title),
                            Err(e) => format!("Could not update saved items: {}", e),
                        }
                    None => format!("No card #{} in the last reply", n),
                }
            Command::Unsave(id) => {
                let item = app.saved_items
                    .items().await
                    .into_iter()
                    .find(|item| item.id == id);
                match item {
                    Some(item) =>
                        match app.saved_items.toggle_save(&item).await {
                            Ok(_) => format!("Removed {}", item.title),
                            Err(e) => format!("Could not update saved items: {}", e),
                        }
                    None => format!("{} is not saved", id),
                }
            }
            Command::Saved => {
                let items = app.saved_items.items().await;
                if items.is_empty() {
                    "No saved items yet.".to_string()
                } else {
                    items
                        .iter()
                        .map(|item| format!(" - {}", describe(item)))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Command::ClearSaved =>
                match app.saved_items.clear_all().await {
                    Ok(()) => "Cleared saved items.".to_string(),
                    Err(e) => format!("Could not clear saved items: {}", e),
                }
            Command::History => {
                let messages = app.chat_history.messages().await;
                if messages.is_empty() {
                    "No chat history.".to_string()
                } else {
                    messages
                        .iter()
                        .map(|m| {
                            let who = if m.is_user { "you" } else { "guide" };
                            format!("[{}] {}: {}", m.timestamp.format("%Y-%m-%d %H:%M"), who, m.text)
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Command::ClearHistory =>
                match app.chat_history.clear_all().await {
                    Ok(()) => "Cleared chat history.".to_string(),
                    Err(e) => format!("Could not clear chat history: {}", e),
                }
            Command::Theme => format!("Theme: {}", app.theme.toggle().await),
            Command::Profile =>
                match app.profile().await {
                    Ok(Some(profile)) => describe_profile(&profile),
                    Ok(None) => "No profile yet. Use /onboard to create one.".to_string(),
                    Err(e) => format!("Could not load profile: {}", e),
                }
            Command::Onboard(data) =>
                match app.complete_onboarding(&data).await {
                    Ok(profile) => format!("Onboarding saved.\n{}", describe_profile(&profile)),
                    Err(e) => format!("Could not save onboarding: {}", e),
                }
            Command::SignOut => {
                app.sign_out().await;
                last_cards.clear();
                "Signed out.".to_string()
            }
            Command::Help => HELP.to_string(),
            Command::Invalid(msg) => msg,
        };

        out.write_all(text.as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await?;
    }

    info!("Session ended");
    Ok(())
}
