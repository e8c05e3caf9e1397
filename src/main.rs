use std::sync::Arc;

use chatgpt::{client::ChatGPT, config::ModelConfigurationBuilder};
use dotenv::dotenv;
use log::{info, warn};
use rand::{rngs::StdRng, SeedableRng};
use stem_trivia_bot::{
    auth::CredentialStore,
    config::Config,
    quiz::{
        ai_helper::{ChatGptBackend, QuizHelper},
        grade::grade_level_info,
        GameState, GameSummary, Question, QuizError, QuizSession, SubmitOutcome,
    },
};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatAction, ChatId, KeyboardButton, KeyboardMarkup, KeyboardRemove},
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type Helper = Arc<QuizHelper<ChatGptBackend>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveUsername,
    ReceivePassword {
        username: String,
    },
    Playing {
        username: String,
        session: QuizSession,
    },
}

type UserInfoStorage = std::sync::Arc<ErasedStorage<State>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting trivia bot...");

    let config = Config::from_env()?;

    let credentials = Arc::new(CredentialStore::from_path(&config.credentials_path)?);
    if credentials.is_empty() {
        warn!(
            "No users in {}, nobody will be able to log in",
            config.credentials_path.display()
        );
    } else {
        info!("Loaded {} users", credentials.len());
    }

    let bot = Bot::from_env();

    info!("Opening dialogue storage {}", config.dialogue_db);
    let storage: UserInfoStorage = SqliteStorage::open(&config.dialogue_db, Json)
        .await?
        .erase();

    let gpt = ChatGPT::new_with_config(
        config.chatgpt_api_key.clone(),
        ModelConfigurationBuilder::default()
            .engine(config.model)
            .timeout(config.timeout)
            .build()?,
    )?;
    let quiz_helper: Helper = Arc::new(QuizHelper::new(ChatGptBackend::new(gpt)));

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveUsername].endpoint(receive_username))
            .branch(dptree::case![State::ReceivePassword { username }].endpoint(receive_password))
            .branch(dptree::case![State::Playing { username, session }].endpoint(playing)),
    )
    .dependencies(dptree::deps![storage, quiz_helper, credentials])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;

    Ok(())
}

const GREETING_TEXT: &str = "🧠 Welcome to the STRAUS Math and Science Trivia Game!\n\n🔐 Please log in. What is your username?";
const HELP_TEXT: &str = "Pick an answer from the keyboard.\n\
    \"Next question\" skips to a new question, \"End game\" shows your final score.\n\
    Send /grade <1-12> to change the grade level.";

const NEXT_QUESTION: &str = "Next question";
const END_GAME: &str = "End game";
const RESTART_GAME: &str = "Restart game";
const LOGOUT: &str = "Logout";

async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT)
        .reply_markup(KeyboardRemove::new())
        .await?;

    dialogue.update(State::ReceiveUsername).await?;
    Ok(())
}

async fn receive_username(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    match msg.text() {
        Some(username) => {
            bot.send_message(msg.chat.id, "Password:").await?;
            dialogue
                .update(State::ReceivePassword {
                    username: username.trim().to_string(),
                })
                .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Please send your username as text")
                .await?;
        }
    }
    Ok(())
}

async fn receive_password(
    bot: Bot,
    dialogue: QuizDialogue,
    username: String,
    msg: Message,
    credentials: Arc<CredentialStore>,
    helper: Helper,
) -> HandlerResult {
    let password = match msg.text() {
        Some(password) => password.to_string(),
        None => {
            bot.send_message(msg.chat.id, "Please send your password as text")
                .await?;
            return Ok(());
        }
    };

    // The password should not stay in the chat history; failing to delete it is not fatal
    let _ = bot.delete_message(msg.chat.id, msg.id).await;

    if !credentials.verify(&username, &password) {
        warn!("Failed login for {:?}", username);
        bot.send_message(
            msg.chat.id,
            "Invalid username or password. What is your username?",
        )
        .await?;
        dialogue.update(State::ReceiveUsername).await?;
        return Ok(());
    }

    info!("{} logged in", username);
    bot.send_message(msg.chat.id, format!("👤 Logged in as: {}\n\n{}", username, HELP_TEXT))
        .await?;

    let mut session = QuizSession::default();
    ask_new_question(&bot, msg.chat.id, &helper, &mut session).await?;

    dialogue.update(State::Playing { username, session }).await?;
    Ok(())
}

async fn playing(
    bot: Bot,
    dialogue: QuizDialogue,
    (username, mut session): (String, QuizSession),
    msg: Message,
    helper: Helper,
) -> HandlerResult {
    let text = match msg.text() {
        Some(text) => text.trim(),
        None => {
            bot.send_message(msg.chat.id, "Please choose one of the options")
                .await?;
            return Ok(());
        }
    };

    match text {
        LOGOUT => {
            info!("{} logged out", username);
            bot.send_message(msg.chat.id, "Logged out. What is your username?")
                .reply_markup(KeyboardRemove::new())
                .await?;
            dialogue.update(State::ReceiveUsername).await?;
            return Ok(());
        }
        END_GAME => match session.end_game() {
            Ok(summary) => {
                bot.send_message(msg.chat.id, game_over_text(&summary))
                    .reply_markup(game_over_keyboard())
                    .await?;
            }
            Err(e) => {
                bot.send_message(msg.chat.id, e.to_string()).await?;
            }
        },
        RESTART_GAME => {
            session.reset();
            ask_new_question(&bot, msg.chat.id, &helper, &mut session).await?;
        }
        NEXT_QUESTION => {
            ask_new_question(&bot, msg.chat.id, &helper, &mut session).await?;
        }
        "/help" => {
            bot.send_message(msg.chat.id, HELP_TEXT).await?;
        }
        _ if text.starts_with("/grade") => {
            match text.trim_start_matches("/grade").trim().parse::<u8>() {
                Ok(grade) => change_grade(&bot, msg.chat.id, &helper, &mut session, grade).await?,
                Err(_) => {
                    bot.send_message(msg.chat.id, "Usage: /grade <1-12>").await?;
                }
            }
        }
        answer => {
            submit_answer(&bot, msg.chat.id, &mut session, answer).await?;
        }
    }

    dialogue.update(State::Playing { username, session }).await?;
    Ok(())
}

async fn change_grade(
    bot: &Bot,
    chat_id: ChatId,
    helper: &Helper,
    session: &mut QuizSession,
    grade: u8,
) -> HandlerResult {
    let previous = session.grade();
    if let Err(e) = session.set_grade(grade) {
        bot.send_message(chat_id, e.to_string()).await?;
        return Ok(());
    }

    let (level, indicator) = grade_level_info(grade);
    bot.send_message(
        chat_id,
        format!("{} Current level: Grade {}, {} School", indicator, grade, level),
    )
    .await?;

    if previous != grade {
        ask_new_question(bot, chat_id, helper, session).await?;
    }
    Ok(())
}

async fn submit_answer(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut QuizSession,
    answer: &str,
) -> HandlerResult {
    match session.submit_answer(answer) {
        Ok(SubmitOutcome::Correct {
            attempts,
            explanation,
        }) => {
            let tries = if attempts == 1 { "try" } else { "tries" };
            bot.send_message(
                chat_id,
                format!(
                    "🎉 Correct! Got it in {} {}!\n\nExplanation: {}\n\n{}",
                    attempts,
                    tries,
                    explanation,
                    score_line(session)
                ),
            )
            .reply_markup(between_questions_keyboard())
            .await?;
        }
        Ok(SubmitOutcome::Incorrect { attempts }) => {
            bot.send_message(
                chat_id,
                format!("❌ Incorrect! Try again!\nAttempts so far: {}", attempts),
            )
            .await?;
        }
        Err(QuizError::InvalidLabel(_)) => {
            bot.send_message(chat_id, "Please choose one of the options")
                .await?;
        }
        Err(QuizError::NotAcceptingAnswers(GameState::GameOver)) => {
            bot.send_message(chat_id, "The game is over.")
                .reply_markup(game_over_keyboard())
                .await?;
        }
        Err(e) => {
            bot.send_message(chat_id, format!("{}. Press \"{}\".", e, NEXT_QUESTION))
                .reply_markup(between_questions_keyboard())
                .await?;
        }
    }
    Ok(())
}

async fn ask_new_question(
    bot: &Bot,
    chat_id: ChatId,
    helper: &Helper,
    session: &mut QuizSession,
) -> HandlerResult {
    // We don't care if this fails, it only tells the user something is happening
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    let mut rng = StdRng::from_entropy();
    let grade = session.grade();
    match session.request_new_question(helper, &mut rng).await {
        Ok(question) => {
            let text = question_text(question, grade);
            let keyboard = question_keyboard(question);
            bot.send_message(chat_id, text).reply_markup(keyboard).await?;
        }
        Err(e) if e.is_generation_failure() => {
            bot.send_message(
                chat_id,
                format!(
                    "Couldn't generate a question right now. Press \"{}\" to try again.",
                    NEXT_QUESTION
                ),
            )
            .reply_markup(between_questions_keyboard())
            .await?;
        }
        Err(QuizError::GameOver) => {
            bot.send_message(chat_id, "The game is over.")
                .reply_markup(game_over_keyboard())
                .await?;
        }
        Err(e) => {
            bot.send_message(chat_id, e.to_string()).await?;
        }
    }
    Ok(())
}

fn question_text(question: &Question, grade: u8) -> String {
    let (level, indicator) = grade_level_info(grade);
    format!(
        "{} Grade {} ({} School)\nCategory: {}\n\n{}\n\n{}",
        indicator,
        grade,
        level,
        question.category,
        question.text,
        question.options.join("\n")
    )
}

fn score_line(session: &QuizSession) -> String {
    let stats = session.stats();
    let mut line = format!(
        "🎯 Correct answers: {}, total questions: {}",
        stats.score, stats.total_questions
    );
    if stats.total_attempts > 0 && stats.total_questions > 0 {
        line.push_str(&format!(", average attempts: {:.1}", stats.average_attempts()));
    }
    line
}

fn game_over_text(summary: &GameSummary) -> String {
    let mut text = format!(
        "Game Over 🎮\n🎯 You answered {} out of {} questions correctly.",
        summary.score, summary.total_questions
    );
    if summary.total_questions > 0 {
        text.push_str(&format!(
            "\n📊 Average attempts per question: {:.1}",
            summary.average_attempts
        ));
    }
    text.push_str("\nThank you for playing the STRAUS Math and Science Trivia Game! 👏");
    text
}

fn question_keyboard(question: &Question) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = question
        .options
        .iter()
        .map(|option| vec![KeyboardButton::new(option.clone())])
        .collect();
    rows.push(vec![
        KeyboardButton::new(NEXT_QUESTION),
        KeyboardButton::new(END_GAME),
    ]);
    KeyboardMarkup::new(rows)
}

fn between_questions_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(NEXT_QUESTION),
        KeyboardButton::new(END_GAME),
    ]])
}

fn game_over_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(RESTART_GAME),
        KeyboardButton::new(LOGOUT),
    ]])
}
