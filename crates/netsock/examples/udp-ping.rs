//! Two UDP endpoints in one process trading a typed packet.
//!
//! Run with:
//!   cargo run --example udp-ping

use netsock::endpoint::UdpEndpoint;
use netsock::frame::DataPacket;
use netsock::transport::Mode;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut pinger = UdpEndpoint::new(Mode::Blocking);
    pinger.bind(0)?;
    let mut ponger = UdpEndpoint::new(Mode::Blocking);
    ponger.bind(0)?;
    let pong_port = ponger.local_addr()?.port();

    for seq in 1..=3u32 {
        let mut ping = DataPacket::new();
        ping.write(seq)?.write("ping")?;
        pinger.send_to(&mut ping, "127.0.0.1", pong_port)?;

        let (mut request, from) = ponger.receive_from()?;
        let got_seq: u32 = request.read()?;
        let word: String = request.read()?;
        println!("ponger <- {word} #{got_seq} from {from:?}");

        let Some(reply_to) = from else {
            continue;
        };
        let mut pong = DataPacket::new();
        pong.write(got_seq)?.write("pong")?;
        ponger.send_to_addr(&mut pong, reply_to)?;

        let mut reply = pinger.receive()?;
        let (mut reply_seq, mut reply_word) = (0u32, String::new());
        reply.read_into(&mut reply_seq)?.read_into(&mut reply_word)?;
        println!("pinger <- {reply_word} #{reply_seq}");
    }

    Ok(())
}
