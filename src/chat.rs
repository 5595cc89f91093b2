//! Question-and-answer session over a single extracted document.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::AppResult;
use crate::llm::{ChatMessage, CompletionClient, Conversation};
use crate::pipeline::prompt::tag;

pub const QA_INSTRUCTION: &str = "You are an assistant that answers questions based on the \
provided document. The document is attached with <Document Start> and <Document End> tags.";

pub const GREETING: &str = "Ask me any questions about the document. Type 'exit' to quit.";
pub const FAREWELL: &str = "Exiting the program. Goodbye!";

/// Keeps one growing conversation: every question and answer is appended so
/// later questions see the earlier exchange.
pub struct DocumentChat {
    client: CompletionClient,
    conversation: Conversation,
}

impl DocumentChat {
    pub fn new(client: CompletionClient, document_text: &str) -> Self {
        let mut conversation = Conversation::with_system(QA_INSTRUCTION);
        conversation.push(ChatMessage::user(tag("Document", document_text)));
        Self {
            client,
            conversation,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub async fn ask(&mut self, question: &str) -> AppResult<String> {
        self.conversation.push(ChatMessage::user(question));
        match self.client.send(&self.conversation).await {
            Ok(completion) => {
                self.conversation
                    .push(ChatMessage::assistant(completion.content.as_str()));
                Ok(completion.content)
            }
            Err(err) => {
                self.conversation.pop();
                Err(err)
            }
        }
    }
}

/// Reads questions line by line until `exit` (any case) or end of input.
pub async fn run_session<R, W>(chat: &mut DocumentChat, input: R, mut output: W) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(format!("{GREETING}\n").as_bytes()).await?;

    let mut lines = input.lines();
    loop {
        output.write_all(b"You: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            output.write_all(b"\n").await?;
            break;
        };
        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        let answer = chat.ask(question).await?;
        output.write_all(format!("AI: {answer}\n").as_bytes()).await?;
    }

    output.write_all(format!("{FAREWELL}\n").as_bytes()).await?;
    output.flush().await?;
    Ok(())
}
