mod ffmpeg;
