//! Device configuration values (`GET_CONFIG_VALUE` / `SET_CONFIG_VALUE`).

use crate::connection::Connection;
use crate::error::Result;
use crate::protocol::{decode_u16, ConfigId, Request};

impl Connection {
    /// Read a raw config value.
    pub async fn config_value(&mut self, id: ConfigId) -> Result<u16> {
        let response = self.execute(Request::GetConfigValue(id)).await?;
        decode_u16(&response)
    }

    /// Write a raw config value.
    pub async fn set_config_value(&mut self, id: ConfigId, value: u16) -> Result<()> {
        self.execute(Request::SetConfigValue(id, value)).await?;
        Ok(())
    }

    /// Chunk size used while stream encrypting.
    pub async fn stream_chunk_size(&mut self) -> Result<u16> {
        self.config_value(ConfigId::StreamChunkSize).await
    }

    pub async fn set_stream_chunk_size(&mut self, size: u16) -> Result<()> {
        self.set_config_value(ConfigId::StreamChunkSize, size).await
    }

    /// Whether fast USB mode is enabled (device answers idle immediately).
    pub async fn fast_usb_mode(&mut self) -> Result<bool> {
        Ok(self.config_value(ConfigId::FastUsbMode).await? != 0)
    }

    pub async fn set_fast_usb_mode(&mut self, enabled: bool) -> Result<()> {
        self.set_config_value(ConfigId::FastUsbMode, u16::from(enabled))
            .await
    }
}
