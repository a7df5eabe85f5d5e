//! Per-conference video compositing and audio mixing for conferences
//! forced into (or grown into) relay/composite mode (§4.7, §4.8).
//!
//! Sits above `conf-relay` in the dependency order and plugs in through
//! `conf_relay::CompositingLifecycle`, which `MediaRelay` drives on
//! topology transitions and on every composite-mode media frame.

pub mod audio;
pub mod compositor;
pub mod grid;
pub mod mixer;
pub mod service;
pub mod time;
pub mod video;

pub use compositor::{synthetic_server_id, CompositorConfig, ConferenceCompositor};
pub use mixer::ConferenceMixer;
pub use service::CompositingService;

#[cfg(test)]
mod tests {
    use super::*;
    use conf_reassembly::CompletedFrame;
    use conf_registry::Registry;
    use conf_relay::{CompositingLifecycle, EgressPool};
    use conf_wire::{ClientId, ConferenceId, PayloadType};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::UdpSocket;

    async fn member_addr(egress: &EgressPool, client: ClientId, listener: &UdpSocket) {
        egress.attach(client, listener.local_addr().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn composite_video_frame_reaches_other_participants() {
        let registry = Arc::new(Registry::new(true));
        let egress = Arc::new(EgressPool::with_start_port(18400));
        let service = CompositingService::new(registry.clone(), egress.clone(), CompositorConfig {
            cadence: Duration::from_millis(5),
            ..CompositorConfig::default()
        });

        let creator = ClientId::new();
        let conference = registry.create_conference(creator).await;
        let member = ClientId::new();
        registry.join(&conference, member).await;

        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        member_addr(&egress, member, &listener).await;

        service.start(conference.clone()).await;

        let frame = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 100, 50]));
        let jpeg = grid::encode_jpeg(&frame, 80).unwrap();
        service
            .ingest_video(
                conference.clone(),
                CompletedFrame {
                    sender: creator,
                    conference: conference.clone(),
                    frame_timestamp: 1,
                    payload_type: PayloadType::Video,
                    bytes: jpeg,
                    padded: false,
                },
            )
            .await;

        let mut buf = [0u8; conf_wire::MAX_DATAGRAM_SIZE];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), listener.recv_from(&mut buf))
            .await
            .expect("composed frame delivered before timeout")
            .unwrap();
        assert!(n > 0);

        service.stop(conference).await;
    }

    #[tokio::test]
    async fn mixed_audio_frame_reaches_other_participants() {
        let registry = Arc::new(Registry::new(true));
        let egress = Arc::new(EgressPool::with_start_port(18500));
        let service = CompositingService::new(registry.clone(), egress.clone(), CompositorConfig::default());

        let creator = ClientId::new();
        let conference = registry.create_conference(creator).await;
        let member = ClientId::new();
        registry.join(&conference, member).await;

        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        member_addr(&egress, member, &listener).await;

        service.start(conference.clone()).await;

        let samples: Vec<u8> = vec![0, 0, 1, 0];
        service
            .ingest_audio(
                conference.clone(),
                CompletedFrame {
                    sender: creator,
                    conference: conference.clone(),
                    frame_timestamp: 1,
                    payload_type: PayloadType::Audio,
                    bytes: samples,
                    padded: false,
                },
            )
            .await;

        let mut buf = [0u8; conf_wire::MAX_DATAGRAM_SIZE];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), listener.recv_from(&mut buf))
            .await
            .expect("mixed frame delivered before timeout")
            .unwrap();
        assert!(n > 0);

        service.stop(conference).await;
    }

    #[tokio::test]
    async fn participant_left_evicts_without_stopping_the_conference() {
        let registry = Arc::new(Registry::new(true));
        let egress = Arc::new(EgressPool::with_start_port(18600));
        let service = CompositingService::new(registry.clone(), egress.clone(), CompositorConfig::default());

        let creator = ClientId::new();
        let conference = registry.create_conference(creator).await;
        service.start(conference.clone()).await;

        service.participant_left(conference.clone(), creator).await;
        // still registered as running; a second start() is a no-op, not a re-spawn.
        service.start(conference.clone()).await;

        service.stop(conference).await;
    }
}
