use std::{sync::Arc, time::Instant};

use anyhow::Context;
use glam::Vec2;
use imgui::{FontConfig, FontSource};
use imgui_winit_support::WinitPlatform;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{CursorIcon, Window},
};

use crate::{
    assets::AssetLoader,
    config::AppConfig,
    engine,
    rendering::renderer::Renderer,
    showroom::{PointerButton, Showroom},
};

struct ImguiState {
    context: imgui::Context,
    platform: WinitPlatform,
}

/// Everything that only exists once the window does.
struct Running {
    renderer: Renderer,
    showroom: Showroom,
    imgui: ImguiState,
    assets: AssetLoader,
}

struct App {
    config: AppConfig,
    running: Option<Running>,
    mouse_pos: Vec2,
    last_frame: Instant,
}

fn viewport(size: PhysicalSize<u32>) -> Vec2 {
    Vec2::new(size.width as f32, size.height as f32)
}

impl App {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            running: None,
            mouse_pos: Vec2::ZERO,
            last_frame: Instant::now(),
        }
    }

    fn setup_imgui(window: &Window) -> ImguiState {
        let mut context = imgui::Context::create();
        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(
            context.io_mut(),
            window,
            imgui_winit_support::HiDpiMode::Default,
        );

        let font_size = 14.0;
        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: font_size,
                ..Default::default()
            }),
        }]);

        context.set_ini_filename(None);

        ImguiState { context, platform }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<Running> {
        let window_config = &self.config.window;
        let window_attributes = Window::default_attributes()
            .with_title(window_config.title.clone())
            .with_inner_size(LogicalSize::new(window_config.width, window_config.height));
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("Failed to create window")?,
        );

        let mut imgui = Self::setup_imgui(&window);

        let mut showroom = Showroom::new(self.config.clone(), viewport(window.inner_size()))
            .context("Failed to create showroom")?;

        let renderer = pollster::block_on(Renderer::new(
            window.clone(),
            &showroom,
            &mut imgui.context,
        ))
        .context("Failed to create renderer")?;

        let assets = AssetLoader::spawn(&self.config.assets, &mut showroom.loading)?;

        window.request_redraw();

        Ok(Running {
            renderer,
            showroom,
            imgui,
            assets,
        })
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }

        match self.start(event_loop) {
            Ok(running) => {
                self.last_frame = Instant::now();
                self.running = Some(running);
            }
            Err(e) => {
                log::error!("{:?}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(Running {
            renderer,
            showroom,
            imgui,
            assets,
        }) = self.running.as_mut()
        else {
            return;
        };

        let imgui_wants_mouse = imgui.context.io().want_capture_mouse;

        match &event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                renderer.resize(*new_size);
                showroom.resize(viewport(*new_size));
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_pos = Vec2::new(position.x as f32, position.y as f32);
                showroom.pointer_moved(self.mouse_pos);
            }
            WindowEvent::CursorLeft { .. } => {
                showroom.pointer_left();
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed if !imgui_wants_mouse => {
                    let button = match button {
                        MouseButton::Left => Some(PointerButton::Primary),
                        MouseButton::Right => Some(PointerButton::Secondary),
                        _ => None,
                    };
                    if let Some(button) = button {
                        showroom.pointer_pressed(button, self.mouse_pos);
                    }
                }
                ElementState::Released => showroom.pointer_released(),
                _ => (),
            },
            WindowEvent::MouseWheel { delta, .. } if !imgui_wants_mouse => {
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y,
                    MouseScrollDelta::PixelDelta(position) => -(position.y as f32),
                };
                showroom.wheel(delta_y);
            }
            WindowEvent::RedrawRequested => {
                let delta_time = self.last_frame.elapsed();
                self.last_frame = Instant::now();
                imgui.context.io_mut().update_delta_time(delta_time);

                renderer.window.request_redraw();

                for asset_event in assets.poll() {
                    showroom.handle_asset_event(asset_event);
                }

                if let Err(e) = imgui
                    .platform
                    .prepare_frame(imgui.context.io_mut(), &renderer.window)
                {
                    log::error!("Failed to prepare imgui frame: {}", e);
                }

                let ui = imgui.context.new_frame();

                if let Err(e) = engine::update(showroom, delta_time.as_secs_f32(), ui) {
                    log::error!("Error during engine::update: {:?}", e);
                    event_loop.exit();
                    return;
                }

                match renderer.render(showroom, &mut imgui.context) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        renderer.resize(renderer.size);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of memory");
                        event_loop.exit();
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        log::warn!("Timeout");
                    }
                    Err(other) => {
                        log::error!("Unexpected error: {:?}", other);
                    }
                }

                renderer.window.set_cursor(if showroom.is_hovering_handle() {
                    CursorIcon::Pointer
                } else {
                    CursorIcon::Default
                });
            }
            _ => (),
        }

        imgui.platform.handle_event::<()>(
            imgui.context.io_mut(),
            &renderer.window,
            &Event::WindowEvent { window_id, event },
        );
    }
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
