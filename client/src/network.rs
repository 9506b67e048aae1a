use crate::display;
use crate::error::ClientError;
use log::{debug, info, warn};
use shared::{outgoing_line, parse_server_line, ClientId, ServerLine};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

pub struct ChatClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    user_id: ClientId,
}

impl ChatClient {
    /// Connects and waits for the identity line the server sends first
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        info!("Connecting to server at {}...", addr);

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        let (reader, writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let first = lines.next_line().await?.ok_or(ClientError::Disconnected)?;
        let user_id = match parse_server_line(&first) {
            ServerLine::Assigned(user_id) => user_id,
            _ => return Err(ClientError::Handshake(first)),
        };

        info!("Connected! User ID: {}", user_id);

        Ok(ChatClient {
            lines,
            writer,
            user_id,
        })
    }

    pub fn user_id(&self) -> ClientId {
        self.user_id
    }

    /// Sends one user submission and returns the line as it went out
    ///
    /// Returns `None` when there was nothing to send.
    pub async fn send(&mut self, input: &str) -> Result<Option<String>, ClientError> {
        let Some(line) = outgoing_line(input) else {
            return Ok(None);
        };

        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(&line);
        framed.push('\n');
        self.writer.write_all(framed.as_bytes()).await?;
        Ok(Some(line))
    }

    /// Waits for the next line from the server; `None` once the server has closed
    pub async fn next_message(&mut self) -> Result<Option<ServerLine>, ClientError> {
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| parse_server_line(&line)))
    }

    /// Relays `input` to the server and server lines to `output`
    ///
    /// Every line sent is echoed to `output` with a "You: " label.
    /// When `input` ends the sending half is shut down and the client keeps
    /// reading until the server closes the connection. The disconnect notice
    /// is written exactly once, after which no further reads are attempted.
    pub async fn run<I, O>(mut self, input: I, mut output: O) -> Result<(), ClientError>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let mut input_lines = input.lines();
        let mut input_open = true;

        write_output(&mut output, &display::welcome(self.user_id)).await?;

        loop {
            tokio::select! {
                received = self.lines.next_line() => match received {
                    Ok(Some(line)) => {
                        let rendered = display::render(&parse_server_line(&line));
                        write_output(&mut output, &rendered).await?;
                    }
                    Ok(None) => {
                        debug!("Server closed the connection");
                        break;
                    }
                    Err(e) => {
                        warn!("Error receiving from server: {}", e);
                        break;
                    }
                },

                typed = input_lines.next_line(), if input_open => match typed? {
                    Some(typed) => match self.send(&typed).await {
                        Ok(Some(sent)) => {
                            write_output(&mut output, &display::own_message(&sent)).await?;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!("Error sending message: {}", e);
                            break;
                        }
                    },
                    None => {
                        debug!("Input closed, shutting down sending half");
                        input_open = false;
                        if let Err(e) = self.writer.shutdown().await {
                            warn!("Error closing connection: {}", e);
                            break;
                        }
                    }
                },
            }
        }

        write_output(&mut output, display::DISCONNECTED).await?;
        Ok(())
    }
}

async fn write_output<O>(output: &mut O, line: &str) -> Result<(), ClientError>
where
    O: AsyncWrite + Unpin,
{
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    /// Single-connection stand-in for the chat server
    async fn fake_server<F, Fut>(script: F) -> (SocketAddr, JoinHandle<()>)
    where
        F: FnOnce(TcpStream) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            script(stream).await;
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_connect_reads_user_id() {
        let (addr, server) = fake_server(|mut stream| async move {
            stream.write_all(b"Your user ID is: 5\n").await.unwrap();
        })
        .await;

        let client = ChatClient::connect(&addr.to_string()).await.unwrap();
        assert_eq!(client.user_id(), 5);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_rejects_unexpected_greeting() {
        let (addr, server) = fake_server(|mut stream| async move {
            stream.write_all(b"hello there\n").await.unwrap();
        })
        .await;

        match ChatClient::connect(&addr.to_string()).await {
            Err(ClientError::Handshake(line)) => assert_eq!(line, "hello there"),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("handshake should have failed"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_without_greeting_is_disconnect() {
        let (addr, server) = fake_server(|stream| async move {
            drop(stream);
        })
        .await;

        assert!(matches!(
            ChatClient::connect(&addr.to_string()).await,
            Err(ClientError::Disconnected)
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert!(matches!(
            ChatClient::connect(&addr).await,
            Err(ClientError::Connect { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_normalises_and_skips_empty_input() {
        let (addr, server) = fake_server(|mut stream| async move {
            stream.write_all(b"Your user ID is: 0\n").await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            assert_eq!(lines.next_line().await.unwrap().unwrap(), "hello world");
            assert_eq!(lines.next_line().await.unwrap(), None);
        })
        .await;

        let mut client = ChatClient::connect(&addr.to_string()).await.unwrap();
        assert_eq!(client.send("   ").await.unwrap(), None);
        assert_eq!(
            client.send("  hello world  ").await.unwrap().as_deref(),
            Some("hello world")
        );
        drop(client);

        timeout(WAIT, server).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_next_message_parses_chat_lines() {
        let (addr, server) = fake_server(|mut stream| async move {
            stream
                .write_all(b"Your user ID is: 1\nClient 0: hi\n")
                .await
                .unwrap();
        })
        .await;

        let mut client = ChatClient::connect(&addr.to_string()).await.unwrap();
        assert_eq!(
            client.next_message().await.unwrap(),
            Some(ServerLine::Chat {
                sender: 0,
                text: "hi".to_string(),
            })
        );
        assert_eq!(client.next_message().await.unwrap(), None);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_relays_both_directions() {
        let (addr, server) = fake_server(|mut stream| async move {
            stream.write_all(b"Your user ID is: 3\n").await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();

            assert_eq!(lines.next_line().await.unwrap().unwrap(), "hello");
            writer.write_all(b"Client 2: hi back\n").await.unwrap();

            // Client shuts down its sending half once input ends
            assert_eq!(lines.next_line().await.unwrap(), None);
        })
        .await;

        let client = ChatClient::connect(&addr.to_string()).await.unwrap();
        let mut output = Vec::new();
        timeout(WAIT, client.run(&b"hello\n\n"[..], &mut output))
            .await
            .unwrap()
            .unwrap();
        server.await.unwrap();

        let shown = String::from_utf8(output).unwrap();
        assert_eq!(
            shown,
            "Connected to server. Your user ID is: 3\n\
             You: hello\n\
             Client 2: hi back\n\
             Disconnected from server.\n"
        );
    }
}
