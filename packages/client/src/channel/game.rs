//! Game operations: join, move, draw and resignation.

use crate::contract::{
    ChessMove, GameContract, GameJoinRequest, GameOutbound, MoveRequest, RoomRef,
};

use super::{Delivery, SessionChannel};

impl SessionChannel<GameContract> {
    /// Emit `game:join` to take a seat in `room_id`.
    pub fn join_game(&self, room_id: &str, player_name: &str) -> Delivery {
        self.emit(GameOutbound::Join(GameJoinRequest {
            room_id: room_id.to_string(),
            player_name: player_name.to_string(),
        }))
    }

    /// Emit `game:move`. Legality is the server's business.
    pub fn make_move(&self, room_id: &str, player_name: &str, chess_move: ChessMove) -> Delivery {
        self.emit(GameOutbound::Move(MoveRequest {
            room_id: room_id.to_string(),
            chess_move,
            player_name: player_name.to_string(),
        }))
    }

    pub fn offer_draw(&self, room_id: &str) -> Delivery {
        self.emit(GameOutbound::DrawOffer(room(room_id)))
    }

    pub fn accept_draw(&self, room_id: &str) -> Delivery {
        self.emit(GameOutbound::DrawAccept(room(room_id)))
    }

    pub fn resign(&self, room_id: &str) -> Delivery {
        self.emit(GameOutbound::Resign(room(room_id)))
    }
}

fn room(room_id: &str) -> RoomRef {
    RoomRef {
        room_id: room_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::{
        channel::GameChannel,
        config::ClientConfig,
        transport::fake::{FakeConnector, OnOpen},
    };

    use super::*;

    async fn connected() -> (FakeConnector, GameChannel) {
        let connector = FakeConnector::new(OnOpen::Connect);
        let channel = GameChannel::new(&ClientConfig::default(), Arc::new(connector.clone()));
        channel.connect().await.unwrap();
        (connector, channel)
    }

    #[tokio::test]
    async fn test_make_move_emits_coordinate_notation() {
        // テスト項目: make_move が game:move {roomId, move, playerName} を送信する
        // given (前提条件):
        let (connector, channel) = connected().await;
        let chess_move: ChessMove = "e7e8q".parse().unwrap();

        // when (操作):
        let delivery = channel.make_move("r1", "alice", chess_move);

        // then (期待する結果):
        assert_eq!(delivery, Delivery::Sent);
        assert_eq!(
            connector.last().sent(),
            vec![(
                "game:move".to_string(),
                json!({ "roomId": "r1", "move": "e7e8q", "playerName": "alice" })
            )]
        );
    }

    #[tokio::test]
    async fn test_room_scoped_commands() {
        // テスト項目: 参加・引き分け提案・受諾・投了がそれぞれ契約どおりのイベントになる
        // given (前提条件):
        let (connector, channel) = connected().await;

        // when (操作):
        let deliveries = [
            channel.join_game("r1", "bob"),
            channel.offer_draw("r1"),
            channel.accept_draw("r1"),
            channel.resign("r1"),
        ];

        // then (期待する結果):
        assert!(deliveries.iter().all(Delivery::is_sent));
        let room = json!({ "roomId": "r1" });
        assert_eq!(
            connector.last().sent(),
            vec![
                (
                    "game:join".to_string(),
                    json!({ "roomId": "r1", "playerName": "bob" })
                ),
                ("game:draw:offer".to_string(), room.clone()),
                ("game:draw:accept".to_string(), room.clone()),
                ("game:resign".to_string(), room),
            ]
        );
    }

    #[tokio::test]
    async fn test_resign_after_disconnect_is_dropped() {
        // テスト項目: 切断後の投了は送信されない
        // given (前提条件):
        let (connector, channel) = connected().await;
        channel.disconnect();

        // when (操作):
        let delivery = channel.resign("r1");

        // then (期待する結果):
        assert_eq!(delivery, Delivery::Dropped);
        assert!(connector.last().sent().is_empty());
    }
}
