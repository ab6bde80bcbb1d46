use clap::Parser;
use proxy::codec::{read_packet, write_packet};
use shared::{
    ClientIdentity, DeviceOs, InputMode, Packet, PlayerAuthInput, CURRENT_PROTOCOL,
    TICK_DURATION_MS,
};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Logs in through the proxy and idles for a while")]
struct Args {
    /// Proxy address
    #[clap(short, long, default_value = "127.0.0.1:19133")]
    address: String,
    /// Player name to log in with
    #[clap(short, long, default_value = "TestClient")]
    name: String,
    /// Inputs to send before disconnecting
    #[clap(short, long, default_value = "100")]
    ticks: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let stream = TcpStream::connect(&args.address).await?;
    stream.set_nodelay(true)?;
    println!("Connected to {}", args.address);
    let (mut reader, mut writer) = stream.into_split();

    let login = Packet::Login {
        identity: ClientIdentity {
            name: args.name.clone(),
            xuid: String::new(),
            device_os: DeviceOs::Win10,
            default_input_mode: InputMode::Mouse,
            game_version: "1.21.30".to_string(),
            protocol: CURRENT_PROTOCOL,
        },
    };
    write_packet(&mut writer, &login).await?;

    // Wait for the world to start
    let position = loop {
        match read_packet(&mut reader).await? {
            Some(Packet::StartGame { runtime_id, position, .. }) => {
                println!("StartGame: runtime id {} at {:?}", runtime_id, position);
                break position;
            }
            Some(Packet::Disconnect { message }) => {
                println!("Disconnected: {}", message);
                return Ok(());
            }
            Some(other) => println!("Received {}", other.name()),
            None => {
                println!("Connection closed before StartGame");
                return Ok(());
            }
        }
    };

    // Latency probes are echoed from the writer side
    let (echo_tx, mut echo_rx) = mpsc::unbounded_channel::<Packet>();
    let read_task = tokio::spawn(async move {
        loop {
            match read_packet(&mut reader).await {
                Ok(Some(Packet::NetworkStackLatency {
                    timestamp,
                    needs_response: true,
                })) => {
                    let echo = Packet::NetworkStackLatency {
                        timestamp,
                        needs_response: false,
                    };
                    if echo_tx.send(echo).is_err() {
                        break;
                    }
                }
                Ok(Some(Packet::Disconnect { message })) => {
                    println!("Disconnected: {}", message);
                    break;
                }
                Ok(Some(packet)) => println!("Received {:?}", packet),
                Ok(None) => {
                    println!("Connection closed");
                    break;
                }
                Err(e) => {
                    println!("Read failed: {}", e);
                    break;
                }
            }
        }
    });

    let mut ticker = interval(Duration::from_millis(TICK_DURATION_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut tick = 0;
    while tick < args.ticks {
        tokio::select! {
            _ = ticker.tick() => {
                tick += 1;
                let input = PlayerAuthInput::idle(tick, position);
                write_packet(&mut writer, &Packet::PlayerAuthInput(input)).await?;
            }
            Some(echo) = echo_rx.recv() => {
                write_packet(&mut writer, &echo).await?;
            }
        }
    }

    println!("Sent {} inputs, disconnecting", args.ticks);
    read_task.abort();
    Ok(())
}
